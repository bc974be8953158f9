use anyhow::{Context, Result};
use google_gmail1::{hyper, hyper_rustls, oauth2};
use log::info;

pub type HttpsConnector = hyper_rustls::HttpsConnector<hyper::client::HttpConnector>;
pub type HttpsClient = hyper::Client<HttpsConnector>;

/// OAuth2 handle for one Google service; token load, refresh and persistence
/// are handled by yup-oauth2.
pub type ServiceAuthenticator = oauth2::authenticator::Authenticator<HttpsConnector>;

pub fn https_client() -> Result<HttpsClient> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http1()
        .build();

    Ok(hyper::Client::builder().build(connector))
}

/// Installed-app OAuth2 flow with tokens cached on disk
pub async fn authenticator(
    credentials_path: &str,
    token_cache_path: &str,
    service: &str,
) -> Result<ServiceAuthenticator> {
    info!("Authenticating {} via OAuth2 (token cache: {})", service, token_cache_path);

    let secret = oauth2::read_application_secret(credentials_path)
        .await
        .with_context(|| format!("Unable to read OAuth2 client credentials file {}", credentials_path))?;

    oauth2::InstalledFlowAuthenticator::builder(
        secret,
        oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .with_context(|| format!("Unable to create OAuth2 authenticator for {}", service))
}
