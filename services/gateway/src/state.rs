use session::SessionHandle;

#[derive(Clone)]
pub struct AppState {
    /// Only path to session state; requests are answered on the session timeline
    pub session: SessionHandle,
}

impl AppState {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}
