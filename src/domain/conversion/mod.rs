//! Remote conversion domain: outcomes and bearer token lifecycle

mod result;
mod session;

pub use result::ConvertResult;
pub use session::{AuthState, ConversionSession, InvalidAuthTransition, TOKEN_LIFETIME};
