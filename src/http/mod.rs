/// HTTP access to the print-ordering service.
pub mod client;
pub mod proxyprint;

pub use client::{ClientConfig, Credentials, PrintShopApi};
pub use proxyprint::ProxyPrintClient;
