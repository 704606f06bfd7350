//! 诊断数据结构
//!
//! 提供统一的错误报告机制。`Diagnostic` 的 `message` 在构造时已渲染完成，
//! 错误码必须来自 [`codes`](super::codes) 注册表。

use crate::util::span::Span;

/// 诊断严重级别
///
/// 翻译期的每个错误都是致命的，没有仅警告的模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
        }
    }
}

/// 诊断信息（message 已渲染完成）
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// 严重级别
    pub severity: Severity,
    /// 错误码，如 "E0301"
    pub code: String,
    /// 稳定的类别名，如 "ScopeViolation"
    pub category: String,
    /// 完整消息
    pub message: String,
    /// 位置信息
    pub span: Option<Span>,
}

impl Diagnostic {
    /// 创建错误诊断
    ///
    /// `pub(crate)`: 外部代码通过错误类型的 `to_diagnostic()` 获得诊断。
    pub(crate) fn error(
        code: &str,
        category: &str,
        message: String,
        span: Option<Span>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            category: category.to_string(),
            message,
            span: span.filter(|s| !s.is_dummy()),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.code, self.category, self.message
        )
    }
}
