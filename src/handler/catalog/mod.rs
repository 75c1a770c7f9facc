mod hdl_upload;
pub use hdl_upload::{hdl_upload, UploadKind};

mod hdl_delete_game;
pub use hdl_delete_game::hdl_delete_game;

mod hdl_list_games;
pub use hdl_list_games::{hdl_game_info, hdl_list_games, hdl_list_my_games};

mod hdl_download;
pub use hdl_download::hdl_download;
