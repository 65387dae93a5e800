//! Types decoded from changefeed webhook requests.

mod event;
mod primary_key;
mod table;

pub use event::*;
pub use primary_key::*;
pub use table::*;
