/// Declares a `u16`-backed id table with bidirectional lookup.
///
/// Generates the enum, an `ALL` slice, `value()`, `name()`, `from_name()`,
/// `TryFrom<u16>` and `Display`.
macro_rules! id_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($table:literal) {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:literal => $label:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u16)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value,
            )+
        }

        impl $name {
            /// Every entry of the table, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Numeric value carried on the wire
            pub fn value(self) -> u16 {
                self as u16
            }

            /// Name used in configuration and logs
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Look up an entry by its name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl TryFrom<u16> for $name {
            type Error = $crate::error::TableError;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err($crate::error::TableError::Unknown { table: $table, value }),
                }
            }
        }

        impl From<$name> for u16 {
            fn from(id: $name) -> u16 {
                id.value()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}
