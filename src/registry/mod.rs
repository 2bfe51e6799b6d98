mod sessions;

pub(crate) use sessions::{SessionHandle, SessionStore};
