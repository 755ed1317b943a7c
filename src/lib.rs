//! # tele104
//!
//! IEC 60870-5-104 tele-control library: the wire codec for the three
//! APDU formats with their typed ASDU payload catalog, and the
//! controlling-station (master) session engine that speaks it over TCP
//! or TLS.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tele104::{Client, ClientHandler, ClientOption, DecodedApdu};
//!
//! struct Printer;
//!
//! impl ClientHandler for Printer {
//!     fn unhandled(&self, apdu: &DecodedApdu) -> tele104::Result<()> {
//!         for element in &apdu.asdu.elements {
//!             println!("{} = {:?}", element.address, element.value);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> tele104::Result<()> {
//!     let option = ClientOption::new("192.168.1.100:2404")?;
//!     let client = Client::with_handler(option, Arc::new(Printer));
//!
//!     client.connect().await?;
//!     client.send_general_interrogation().await?;
//!     client.send_single_command(0x6001, true).await?;
//!     client.close().await
//! }
//! ```
//!
//! ## Protocol shape
//!
//! Every unit on the wire is an APDU:
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+----------+
//! | 0x68   | length | CF1    | CF2    | CF3    | CF4    | ASDU ... |
//! +--------+--------+--------+--------+--------+--------+----------+
//! ```
//!
//! The low bits of CF1 classify the frame: I-frames number and carry
//! data, S-frames acknowledge, U-frames gate the session
//! (STARTDT/STOPDT) and heartbeat it (TESTFR). Sequence numbers are 15
//! bits, zeroed on connect, wrapping at 32768.

pub mod client;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod handler;
pub mod options;
pub mod parser;
pub mod types;

pub use client::Client;
pub use codec::{Apdu, ApduCodec, DecodedApdu};
pub use error::{Error, Result};
pub use handler::{ClientHandler, NullHandler};
pub use options::{ClientOption, ConnectionHook};
pub use parser::{decode_asdu, CommandKind, CommandResponse, DecodedAsdu};
pub use types::*;
