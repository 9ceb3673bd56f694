mod macros;

pub mod commom;
pub mod epoll;
pub mod eventfd;
pub mod fd;

pub use epoll::Epoll;
pub use fd::FileDesc;
