pub mod session;

pub use session::CasebookSession;
