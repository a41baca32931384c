//! VPTS framing for Vantage.
//!
//! One frame per logical message, in either direction:
//!
//! ```text
//! vpts{length=<decimal-byte-count>}vpts<raw-payload-bytes>
//! ```
//!
//! The coordinator sends a single frame holding the campaign URL and expects
//! a single frame holding the page body back.
//!
//! ```rust,no_run
//! use vantage_vpts::{read_frame, write_frame, READ_SIZE};
//!
//! # async fn example() -> vantage_core::error::Result<()> {
//! let mut stream = compio::net::TcpStream::connect("127.0.0.1:9000").await?;
//! write_frame(&mut stream, b"http://example.test/").await?;
//! let page = read_frame(&mut stream, READ_SIZE, None).await?;
//! println!("{} bytes", page.len());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod io;

pub use codec::{encode_frame, encode_header, FrameDecoder, FrameError};
pub use io::{read_frame, write_frame, READ_SIZE};
