//! 错误码注册表
//!
//! 所有诊断的错误码与类别名集中定义于此，类别名是稳定的对外接口。

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCodeDefinition {
    /// 错误码，如 "E0301"
    pub code: &'static str,
    /// 类别名
    pub category: &'static str,
    /// 简短说明
    pub summary: &'static str,
}

/// E00xx: 词法分析
pub const LEX_ERROR: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0001",
    category: "LexError",
    summary: "the source text could not be tokenized",
};

/// E01xx: 语法分析
pub const PARSE_ERROR: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0101",
    category: "ParseError",
    summary: "the token stream does not form a valid program",
};

/// 名称解析
pub const UNDEFINED_NAME: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0201",
    category: "UndefinedName",
    summary: "a name does not resolve to any binding, global or function",
};

/// 声明错误
pub const DECLARATION_ERROR: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0202",
    category: "DeclarationError",
    summary: "a declaration or construct is not valid in this position",
};

/// 类型错误
pub const TYPE_ERROR: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0203",
    category: "TypeError",
    summary: "an operation received a value of the wrong type",
};

/// 编译期求值错误
pub const EVALUATION_ERROR: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0204",
    category: "EvaluationError",
    summary: "meta-stage evaluation failed",
};

/// E03xx: 分期检查
pub const SCOPE_VIOLATION: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0301",
    category: "ScopeViolation",
    summary: "a value is used outside the stage in which it is bound",
};

pub const CONSTANCY_VIOLATION: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0302",
    category: "ConstancyViolation",
    summary: "an argument under a constancy obligation is not a constant expression",
};

pub const NON_LITERAL_PORT: ErrorCodeDefinition = ErrorCodeDefinition {
    code: "E0303",
    category: "NonLiteralPortError",
    summary: "a meta-stage value of non-literal type cannot become object-stage data",
};

/// 完整的错误码注册表
pub const ERROR_CODES: &[ErrorCodeDefinition] = &[
    LEX_ERROR,
    PARSE_ERROR,
    UNDEFINED_NAME,
    DECLARATION_ERROR,
    TYPE_ERROR,
    EVALUATION_ERROR,
    SCOPE_VIOLATION,
    CONSTANCY_VIOLATION,
    NON_LITERAL_PORT,
];

impl ErrorCodeDefinition {
    /// 按错误码查找
    pub fn find(code: &str) -> Option<&'static ErrorCodeDefinition> {
        ERROR_CODES.iter().find(|def| def.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<_> = ERROR_CODES.iter().map(|d| d.code).collect();
        let categories: HashSet<_> = ERROR_CODES.iter().map(|d| d.category).collect();
        assert_eq!(codes.len(), ERROR_CODES.len());
        assert_eq!(categories.len(), ERROR_CODES.len());
    }

    #[test]
    fn test_find() {
        assert_eq!(
            ErrorCodeDefinition::find("E0302").map(|d| d.category),
            Some("ConstancyViolation")
        );
        assert!(ErrorCodeDefinition::find("E9999").is_none());
    }
}
