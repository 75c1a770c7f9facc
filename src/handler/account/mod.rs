mod hdl_register;
pub use hdl_register::hdl_register;

mod hdl_login;
pub use hdl_login::hdl_login;

mod hdl_logout;
pub use hdl_logout::hdl_logout;
