//! # Receive path
//!
//! | Module      | Purpose                                                 |
//! |-------------|---------------------------------------------------------|
//! | `session`   | One receive handle; frame capture behind a borrow guard |
//! | `kernel`    | `PixelKernel` trait and the CPU reference kernel        |
//! | `converter` | Native layouts to a reusable RGBA8 `DecodedImage`       |
//! | `pipeline`  | The per-tick orchestrator                               |

pub mod converter;
pub mod kernel;
pub mod pipeline;
pub mod session;

pub use converter::{DecodedImage, FrameConverter, FrameLayout};
pub use kernel::{CpuKernel, PixelKernel};
pub use pipeline::{ReceiverConfig, ReceiverPipeline, ReceiverStats, RenderAdapter, TickOutcome};
pub use session::{CapturedFrame, ReceiveSession};
