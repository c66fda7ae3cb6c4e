pub mod common;
pub mod logger;

#[cfg(test)]
pub mod test_server;
