use std::sync::Arc;

use crate::api::{GmailClient, MailClient, RetryPolicy};
use crate::auth::{FileTokenStore, OAuthClient, Session};
use crate::config::{self, AppPaths, Settings};
use crate::error::AppResult;
use crate::output::Output;
use crate::triage::{Responder, ResponderConfig};

#[derive(Debug)]
pub struct AppContext {
    pub profile: String,
    pub paths: AppPaths,
    pub settings: Settings,
    pub token_store: FileTokenStore,
    pub output: Output,
}

impl AppContext {
    pub fn bootstrap(profile: String, json: bool) -> AppResult<Self> {
        let profile = config::resolve_profile(&profile);
        let paths = AppPaths::discover()?;
        let settings = config::load_settings(&paths, &profile)?;
        let token_store = FileTokenStore::new(paths.clone());
        let output = Output::new(json);

        Ok(Self {
            profile,
            paths,
            settings,
            token_store,
            output,
        })
    }

    pub fn oauth_client(&self) -> AppResult<Option<OAuthClient>> {
        OAuthClient::resolve(&self.settings, &self.paths)
    }

    pub fn mail_client(&self) -> AppResult<Arc<dyn MailClient>> {
        let session = Session::new(
            self.profile.clone(),
            self.oauth_client()?,
            self.token_store.clone(),
        );
        let retry = RetryPolicy::new(self.settings.retry_attempts());
        let client = GmailClient::new(Arc::new(session), retry)?;
        Ok(Arc::new(client))
    }

    pub fn responder(&self) -> AppResult<Responder> {
        let config = ResponderConfig::from_settings(&self.settings)?;
        Ok(Responder::new(self.mail_client()?, config))
    }
}
