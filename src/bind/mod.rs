//! Binding of configuration properties to typed values.

mod binder;
mod context;
mod de;
mod error;
mod handler;
mod validation;

pub use binder::Binder;
pub use context::{BindContext, Bindable, Member, MAP, SEQUENCE};
pub use error::{BindError, BindFailure, ConversionError, UnboundElements};
pub use handler::{
    BindHandler, DefaultBindHandler, IgnoreNestedPropertiesBindHandler,
    NoUnboundElementsBindHandler, TracingBindHandler,
};
pub use validation::{
    Errors, FieldError, ObjectError, Validate, ValidationError, ValidationErrors,
    OBJECT_ERROR_MESSAGE,
};
