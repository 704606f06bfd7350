//! 统一诊断系统
//!
//! 提供错误码注册表、诊断数据结构和 rustc 风格的渲染器
//!
//! # 模块结构
//!
//! - [`error`] - 诊断数据结构 (Diagnostic, Severity)
//! - [`codes`] - 错误码注册表
//!
//! # 示例
//!
//! ```ignore
//! use metastage::util::diagnostic::DiagnosticRenderer;
//!
//! let renderer = DiagnosticRenderer::new();
//! let output = renderer.render(&diagnostic, Some(&source_file));
//! eprintln!("{}", output);
//! ```

pub mod codes;
pub mod error;

// 重新导出
pub use codes::{ErrorCodeDefinition, ERROR_CODES};
pub use error::{Diagnostic, Severity};

use crate::util::span::SourceFile;
use owo_colors::OwoColorize;

/// 渲染器配置
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// 是否启用颜色输出
    pub use_colors: bool,
    /// 是否显示源码片段
    pub show_source: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_source: true,
        }
    }
}

impl From<&crate::util::config::DiagnosticsConfig> for EmitterConfig {
    fn from(config: &crate::util::config::DiagnosticsConfig) -> Self {
        Self {
            use_colors: config.colors,
            show_source: config.show_source,
        }
    }
}

/// 诊断渲染器
#[derive(Debug, Clone, Default)]
pub struct DiagnosticRenderer {
    /// 渲染配置
    config: EmitterConfig,
}

impl DiagnosticRenderer {
    /// 创建新的渲染器
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义配置创建渲染器
    pub fn with_config(config: EmitterConfig) -> Self {
        Self { config }
    }

    /// 渲染单个诊断信息
    pub fn render(
        &self,
        diagnostic: &Diagnostic,
        source_file: Option<&SourceFile>,
    ) -> String {
        let mut output = String::new();

        // 1. 渲染错误头部
        output.push_str(&self.render_header(diagnostic));

        // 2. 渲染源码位置和片段
        output.push_str(&self.render_source_location(diagnostic, source_file));
        if self.config.show_source {
            if let Some(snippet) = self.render_source_snippet(diagnostic, source_file) {
                output.push_str(&snippet);
            }
        }

        output
    }

    /// 渲染多个诊断信息
    pub fn render_all<'a>(
        &self,
        diagnostics: impl IntoIterator<Item = &'a Diagnostic>,
        source_file: Option<&SourceFile>,
    ) -> String {
        let mut output = String::new();
        for diagnostic in diagnostics {
            output.push_str(&self.render(diagnostic, source_file));
            output.push('\n');
        }
        output
    }

    /// 渲染错误头部
    fn render_header(
        &self,
        diagnostic: &Diagnostic,
    ) -> String {
        let severity = diagnostic.severity.to_string();
        let code = format!("[{}]", diagnostic.code);
        if self.config.use_colors {
            let severity = match diagnostic.severity {
                Severity::Error => severity.red().bold().to_string(),
            };
            format!(
                "{}{} {}: {}\n",
                severity,
                code.bold(),
                diagnostic.category.bold(),
                diagnostic.message
            )
        } else {
            format!(
                "{}{} {}: {}\n",
                severity, code, diagnostic.category, diagnostic.message
            )
        }
    }

    /// 渲染源码位置
    fn render_source_location(
        &self,
        diagnostic: &Diagnostic,
        source_file: Option<&SourceFile>,
    ) -> String {
        match &diagnostic.span {
            Some(span) => {
                let file_name = source_file
                    .map(|sf| sf.name.as_str())
                    .unwrap_or("<unknown>");
                format!(
                    " --> {}:{}:{}\n",
                    file_name, span.start.line, span.start.column
                )
            }
            None => String::new(),
        }
    }

    /// 渲染源码片段（只显示起始行）
    fn render_source_snippet(
        &self,
        diagnostic: &Diagnostic,
        source_file: Option<&SourceFile>,
    ) -> Option<String> {
        let span = diagnostic.span.as_ref()?;
        let line = source_file?.line(span.start.line)?;

        let mut output = String::new();
        output.push_str(&format!("{:>4} | {}\n", span.start.line, line));

        let width = if span.end.line == span.start.line {
            span.end.column.saturating_sub(span.start.column).max(1)
        } else {
            line.chars()
                .count()
                .saturating_sub(span.start.column.saturating_sub(1))
                .max(1)
        };
        let spaces = " ".repeat(span.start.column.saturating_sub(1));
        let carets = "^".repeat(width);
        let carets = if self.config.use_colors {
            carets.red().bold().to_string()
        } else {
            carets
        };
        output.push_str(&format!("{} | {}{}\n", " ".repeat(4), spaces, carets));
        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::span::{Position, SourceFile, Span};

    fn plain() -> DiagnosticRenderer {
        DiagnosticRenderer::with_config(EmitterConfig {
            use_colors: false,
            show_source: true,
        })
    }

    #[test]
    fn test_render_with_source() {
        let source = "fn main() {\n    print(i);\n}\n";
        let source_file = SourceFile::new("loop.stg", source);

        let diagnostic = Diagnostic::error(
            codes::SCOPE_VIOLATION.code,
            codes::SCOPE_VIOLATION.category,
            "value `i` is not available outside its meta-stage binding scope".to_string(),
            Some(Span::new(
                Position::with_offset(2, 11, 22),
                Position::with_offset(2, 12, 23),
            )),
        );

        let output = plain().render(&diagnostic, Some(&source_file));
        assert!(output.contains("error[E0301] ScopeViolation"), "{}", output);
        assert!(output.contains("loop.stg:2:11"), "{}", output);
        assert!(output.contains("print(i);"), "{}", output);
        assert!(output.contains("          ^\n"), "{}", output);
    }

    #[test]
    fn test_render_without_span() {
        let diagnostic = Diagnostic::error(
            codes::NON_LITERAL_PORT.code,
            codes::NON_LITERAL_PORT.category,
            "type `[int]` is not a literal type".to_string(),
            None,
        );
        let output = plain().render(&diagnostic, None);
        assert_eq!(
            output,
            "error[E0303] NonLiteralPortError: type `[int]` is not a literal type\n"
        );
    }

    #[test]
    fn test_colors_add_escape_codes() {
        let diagnostic = Diagnostic::error(
            codes::TYPE_ERROR.code,
            codes::TYPE_ERROR.category,
            "mismatch".to_string(),
            None,
        );
        let output = DiagnosticRenderer::new().render(&diagnostic, None);
        assert!(output.contains("\x1b["));
    }
}
