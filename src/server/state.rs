use std::path::PathBuf;

use crate::settings::Settings;
use crate::worker::JobPool;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) settings: Settings,
    pub(crate) pool: JobPool,
    pub(crate) session_base: PathBuf,
}
