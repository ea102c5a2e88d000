//! Unit tests for the middleware, kept apart from the implementation files.
