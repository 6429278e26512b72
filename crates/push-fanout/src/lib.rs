//! 推送通知扇出引擎
//!
//! 将一条通知按收件人设备令牌拆分为有上限的批次，并发投递到推送网关，
//! 再把各批次结果汇总为一个成功/失败结果。网关级的系统性失败与单个收件人的
//! 投递失败分开上报，调用方可以据此区分"网关故障"和"令牌噪音"。
//!
//! 引擎本身不记录指标，计数由调用方根据返回值自行上报。

pub mod aggregate;
pub mod batch;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod message;
pub mod model;
pub mod router;

pub use aggregate::{BatchOutcome, PushReport, ResultAggregator};
pub use batch::{BatchPartitioner, DispatchBatch, MAX_BATCH_SIZE};
pub use dispatcher::ConcurrentDispatcher;
pub use error::{CombinedError, DirectError, DispatchErrors, GatewayError, RecipientError};
pub use gateway::{BatchResponse, LoggingGateway, PushGateway, SendResponse};
pub use message::{AlertBlock, MessageBuilder, MulticastMessage, PushContent, SingleMessage};
pub use model::{Notification, NotificationMessage, Recipient, RichText};
pub use router::DispatchRouter;
