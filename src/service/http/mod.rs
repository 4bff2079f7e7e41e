//! HTTP服务模块
//!
//! 管理HTTP相关的服务

mod gate;

pub use self::gate::GateHttpService;
