//! Helper macro for declaring driven-port error enums.
//!
//! Each variant gets a `thiserror` message and a snake_case constructor whose
//! parameters accept anything convertible into the field type, so adapters
//! can write `IdentityStoreError::connection("pool closed")`.

macro_rules! define_port_error {
    (@constructor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@constructor $variant:ident { $($field:ident : $ty:ty),* }) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($field: impl Into<$ty>),*) -> Self {
                Self::$variant { $($field: $field.into()),* }
            }
        }
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@constructor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Constructor and message coverage for generated port errors.
    use crate::domain::UserId;

    define_port_error! {
        pub enum SamplePortError {
            Offline => "store offline",
            Timeout { message: String } => "timed out: {message}",
            Missing { user_id: UserId, attempts: u32 } => "user {user_id} missing after {attempts} attempts",
        }
    }

    #[test]
    fn unit_variants_get_nullary_constructors() {
        assert_eq!(SamplePortError::offline(), SamplePortError::Offline);
        assert_eq!(SamplePortError::offline().to_string(), "store offline");
    }

    #[test]
    fn string_fields_accept_str() {
        let err = SamplePortError::timeout("pool checkout");
        assert_eq!(err.to_string(), "timed out: pool checkout");
    }

    #[test]
    fn non_string_fields_keep_their_types() {
        let user_id = UserId::random();
        let err = SamplePortError::missing(user_id.clone(), 3_u32);
        assert_eq!(
            err.to_string(),
            format!("user {user_id} missing after 3 attempts")
        );
    }
}
