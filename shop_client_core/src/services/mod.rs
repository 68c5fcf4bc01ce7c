//! 领域服务：把管道调用翻译成类型化的业务操作，错误原样向上传递

pub mod auth;
pub mod product;

pub use auth::AuthService;
pub use product::ProductService;
