pub mod address_validator;
pub mod amount_format;

pub use address_validator::AddressValidator;
pub use amount_format::format_amount;
