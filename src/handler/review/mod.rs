mod hdl_submit_review;
pub use hdl_submit_review::hdl_submit_review;

mod hdl_get_reviews;
pub use hdl_get_reviews::hdl_get_reviews;
