pub mod api_quota;
pub mod label_colors;
