//! # Frame Loop
//!
//! 仿真-渲染-发布同步循环。
//!
//! 每个节拍：
//! 1. 运动策略给出下一车辆状态
//! 2. 推送到实体代理
//! 3. 请求渲染当前帧并等待输出
//! 4. 提交帧计数器
//! 5. 以同一时间戳发布所有通道
//!
//! ## 使用示例
//!
//! ```ignore
//! use frame_loop::{FrameLoop, VerticalOscillation};
//!
//! let mut frame_loop = FrameLoop::new(bridge, handle, publisher)?
//!     .with_motion(VerticalOscillation::default())
//!     .with_max_frames(Some(100));
//!
//! frame_loop.run(SceneId::Industrial, |_| true).await?;
//! let stats = frame_loop.finish(Some(Duration::from_secs(5))).await;
//! ```

mod error;
mod motion;
mod retry;
mod runner;
pub mod session;
mod stats;

pub use error::{LoopError, Result};
pub use motion::{motion_from_config, HoldState, MotionPolicy, Trajectory, VerticalOscillation};
pub use retry::RetryPolicy;
pub use runner::{FrameLoop, LoopSettings, LoopState, TerminationReason, TickReport};
pub use session::from_blueprint;
pub use stats::LoopStats;
