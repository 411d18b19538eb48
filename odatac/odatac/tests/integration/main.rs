mod builder;
mod error_messages;
mod odata;
mod sql;
