//! Intercepted operations.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

macro_rules! operation_kinds {
    ($($variant:ident = $code:literal, $name:literal;)*) => {
        /// Kind of operation the host engine asks about.
        ///
        /// Codes follow SQLite's authorizer action codes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OperationKind {
            $($variant,)*
            /// A code this crate does not model.
            Unknown(i32),
        }

        impl OperationKind {
            /// Kind for a host action code.
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => OperationKind::$variant,)*
                    other => OperationKind::Unknown(other),
                }
            }

            pub fn code(self) -> i32 {
                match self {
                    $(OperationKind::$variant => $code,)*
                    OperationKind::Unknown(code) => code,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(OperationKind::$variant => $name,)*
                    OperationKind::Unknown(_) => "unknown",
                }
            }

            /// Kind for a snake_case name such as `drop_table`.
            pub fn from_name(name: &str) -> Option<Self> {
                $(if name.eq_ignore_ascii_case($name) {
                    return Some(OperationKind::$variant);
                })*
                None
            }

            /// Every modelled kind.
            pub fn all() -> &'static [OperationKind] {
                &[$(OperationKind::$variant,)*]
            }
        }
    };
}

operation_kinds! {
    Copy = 0, "copy";
    CreateIndex = 1, "create_index";
    CreateTable = 2, "create_table";
    CreateTempIndex = 3, "create_temp_index";
    CreateTempTable = 4, "create_temp_table";
    CreateTempTrigger = 5, "create_temp_trigger";
    CreateTempView = 6, "create_temp_view";
    CreateTrigger = 7, "create_trigger";
    CreateView = 8, "create_view";
    Delete = 9, "delete";
    DropIndex = 10, "drop_index";
    DropTable = 11, "drop_table";
    DropTempIndex = 12, "drop_temp_index";
    DropTempTable = 13, "drop_temp_table";
    DropTempTrigger = 14, "drop_temp_trigger";
    DropTempView = 15, "drop_temp_view";
    DropTrigger = 16, "drop_trigger";
    DropView = 17, "drop_view";
    Insert = 18, "insert";
    Pragma = 19, "pragma";
    Read = 20, "read";
    Select = 21, "select";
    Transaction = 22, "transaction";
    Update = 23, "update";
    Attach = 24, "attach";
    Detach = 25, "detach";
    AlterTable = 26, "alter_table";
    Reindex = 27, "reindex";
    Analyze = 28, "analyze";
    CreateVtable = 29, "create_vtable";
    DropVtable = 30, "drop_vtable";
    Function = 31, "function";
    Savepoint = 32, "savepoint";
    Recursive = 33, "recursive";
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Unknown(code) => write!(f, "unknown({code})"),
            kind => f.write_str(kind.name()),
        }
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::UnknownOperation(s.to_string()))
    }
}

/// One authorizer callback: the operation and up to two arguments.
///
/// Argument meaning depends on the kind, e.g. `(table, column)` for a read
/// and `(index, table)` for index creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationEvent<'a> {
    pub kind: OperationKind,
    pub arg1: Option<&'a str>,
    pub arg2: Option<&'a str>,
    /// Database the operation targets.
    pub database: Option<&'a str>,
}

impl<'a> AuthorizationEvent<'a> {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            arg1: None,
            arg2: None,
            database: None,
        }
    }

    pub fn arg1(mut self, arg: &'a str) -> Self {
        self.arg1 = Some(arg);
        self
    }

    pub fn arg2(mut self, arg: &'a str) -> Self {
        self.arg2 = Some(arg);
        self
    }

    pub fn database(mut self, database: &'a str) -> Self {
        self.database = Some(database);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for kind in OperationKind::all() {
            assert_eq!(OperationKind::from_code(kind.code()), *kind);
            assert_eq!(OperationKind::from_name(kind.name()), Some(*kind));
        }
        assert_eq!(OperationKind::from_code(99), OperationKind::Unknown(99));
        assert_eq!(OperationKind::Unknown(99).to_string(), "unknown(99)");
    }

    #[test]
    fn test_parse_name() {
        assert_eq!("DROP_TABLE".parse::<OperationKind>().unwrap(), OperationKind::DropTable);
        assert!("vacuum".parse::<OperationKind>().is_err());
    }
}
