mod diagnostics;
mod queries;
mod rename;
mod session;
