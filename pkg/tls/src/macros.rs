#[macro_export]
macro_rules! tls_enum_u8 {
    ($(#[$meta:meta])* $name:ident => { $( $case:ident ( $val:expr ) ),* , (255) }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        pub enum $name {
            $(
                $case,
            )*
            unknown(u8)
        }

        impl $name {
            pub fn to_u8(&self) -> u8 {
                match self {
                    $(
                        $name::$case => $val,
                    )*
                    $name::unknown(v) => *v
                }
            }

            pub fn from_u8(v: u8) -> Self {
                $(
                    if v == $val {
                        return $name::$case;
                    }
                )*
                $name::unknown(v)
            }

            pub fn serialize(&self, out: &mut std::vec::Vec<u8>) {
                out.push(self.to_u8());
            }
        }
    };
}

#[macro_export]
macro_rules! tls_enum_u16 {
    ($(#[$meta:meta])* $name:ident => { $( $case:ident ( $val:expr ) ),* , (65535) }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        pub enum $name {
            $(
                $case,
            )*
            unknown(u16)
        }

        impl $name {
            pub fn to_u16(&self) -> u16 {
                match self {
                    $(
                        $name::$case => $val,
                    )*
                    $name::unknown(v) => *v
                }
            }

            pub fn from_u16(v: u16) -> Self {
                $(
                    if v == $val {
                        return $name::$case;
                    }
                )*
                $name::unknown(v)
            }

            pub fn serialize(&self, out: &mut std::vec::Vec<u8>) {
                out.extend_from_slice(&self.to_u16().to_be_bytes());
            }
        }
    };
}
