use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientError, Context};

use super::session::Session;
use super::FetchResult;

const DEFAULT_LOGIN_URL: &str = "https://login.questrade.com";

pub const DEFAULT_API_VERSION: &str = "v1";

/// Margin subtracted from the server-side expiry when deciding staleness.
const TOKEN_MARGIN: Duration = Duration::from_secs(120);

/// The login host reports a rejected refresh token as this bare string, not
/// as a JSON document.
const BAD_REQUEST_BODY: &str = "Bad Request";

/// Access token handed out by the OAuth exchange, valid for `expires_in`
/// seconds against the `api_server` it names.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub api_server: String,
    pub expires_in: u64,
    #[serde(skip, default = "Instant::now")]
    acquired_at: Instant,
}

impl AccessToken {
    pub fn expires_at(&self) -> Instant {
        self.acquired_at + Duration::from_secs(self.expires_in)
    }

    /// Whether the token is inside the safety margin of its expiry. The
    /// client never refreshes on its own; callers check this and call
    /// [`BrokerageClient::refresh`] ahead of time.
    pub fn is_stale(&self) -> bool {
        Instant::now() + TOKEN_MARGIN >= self.expires_at()
    }

    fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("api_server", &self.api_server)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Historical-data granularity accepted by the candles endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleGranularity {
    OneMinute,
    TwoMinutes,
    ThreeMinutes,
    FourMinutes,
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    TwentyMinutes,
    HalfHour,
    OneHour,
    TwoHours,
    FourHours,
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
}

impl CandleGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleGranularity::OneMinute => "OneMinute",
            CandleGranularity::TwoMinutes => "TwoMinutes",
            CandleGranularity::ThreeMinutes => "ThreeMinutes",
            CandleGranularity::FourMinutes => "FourMinutes",
            CandleGranularity::FiveMinutes => "FiveMinutes",
            CandleGranularity::TenMinutes => "TenMinutes",
            CandleGranularity::FifteenMinutes => "FifteenMinutes",
            CandleGranularity::TwentyMinutes => "TwentyMinutes",
            CandleGranularity::HalfHour => "HalfHour",
            CandleGranularity::OneHour => "OneHour",
            CandleGranularity::TwoHours => "TwoHours",
            CandleGranularity::FourHours => "FourHours",
            CandleGranularity::OneDay => "OneDay",
            CandleGranularity::OneWeek => "OneWeek",
            CandleGranularity::OneMonth => "OneMonth",
            CandleGranularity::OneYear => "OneYear",
        }
    }
}

/// One OHLCV period as returned by the candles endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub open: f64,
    pub close: f64,
    pub low: f64,
    pub high: f64,
    pub volume: u64,
    #[serde(rename = "VWAP")]
    pub vwap: f64,
}

#[derive(Deserialize)]
struct CandlesResponse {
    candles: Option<Vec<Candle>>,
}

/// Authenticated client for the brokerage REST API.
///
/// The client owns one logical session: `authenticate` and `refresh` swap
/// the session's default `Authorization` header in place, so every
/// subsequent call rides the newest token. The mutable state (token, session
/// headers, cached accounts) makes an instance unsafe to share across
/// threads; use one client per thread.
pub struct BrokerageClient {
    session: Session,
    login_url: String,
    access_token: Option<AccessToken>,
    accounts: Option<Value>,
}

impl BrokerageClient {
    pub fn new() -> FetchResult<Self> {
        Self::with_login_url(DEFAULT_LOGIN_URL)
    }

    pub fn with_login_url<U: Into<String>>(login_url: U) -> FetchResult<Self> {
        let login_url = login_url.into();

        Ok(Self {
            session: Session::new(Default::default())?,
            login_url: login_url.trim_end_matches('/').to_string(),
            access_token: None,
            accounts: None,
        })
    }

    /// Current token, or `None` before `authenticate` has succeeded.
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// Account snapshot cached by the last `list_accounts` call.
    pub fn accounts(&self) -> Option<&Value> {
        self.accounts.as_ref()
    }

    /// Exchange the long-lived refresh token issued by the brokerage portal
    /// for an access token, install it on the session, and prime the account
    /// cache.
    pub fn authenticate(&mut self, refresh_token: &str) -> FetchResult<&AccessToken> {
        let token = self.exchange_token(refresh_token)?;
        self.install_token(token)?;
        self.list_accounts(DEFAULT_API_VERSION)?;
        self.token()
    }

    /// Obtain a new access token using the refresh token stored on the
    /// client. Re-entrant: the client stays authenticated across calls.
    ///
    /// Expired tokens are not detected reactively; callers are expected to
    /// watch [`AccessToken::is_stale`] and refresh before expiry.
    pub fn refresh(&mut self) -> FetchResult<&AccessToken> {
        let refresh_token = self.token()?.refresh_token.clone();
        let token = self.exchange_token(&refresh_token)?;
        self.install_token(token)?;
        self.token()
    }

    /// Fetch the account list and overwrite the cached snapshot. Always goes
    /// to the server; the cache is only a convenience for later reads.
    pub fn list_accounts(&mut self, api_version: &str) -> FetchResult<Value> {
        let url = self.endpoint_url(api_version, "accounts")?;

        let body = self
            .session
            .get(&url)?
            .text()
            .context("Failed to read accounts response")?;
        let accounts: Value =
            serde_json::from_str(&body).context("Failed to parse accounts response")?;

        self.accounts = Some(accounts.clone());
        Ok(accounts)
    }

    /// Fetch candles for a symbol over `[start_date, end_date]` at the given
    /// granularity. Both bounds are rendered at midnight with a fixed
    /// `-05:00` offset; the upstream API resolves them in Eastern time.
    pub fn get_candles(
        &self,
        symbol_id: u64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        granularity: CandleGranularity,
        api_version: &str,
    ) -> FetchResult<Vec<Candle>> {
        let path = format!(
            "markets/candles/{}?startTime={}&endTime={}&interval={}",
            symbol_id,
            candle_bound(start_date),
            candle_bound(end_date),
            granularity.as_str()
        );
        let url = self.endpoint_url(api_version, &path)?;

        log::debug!("Requesting candles for symbol {}", symbol_id);

        let body = self
            .session
            .get(&url)?
            .text()
            .with_context(|| format!("Failed to read candles response for {}", symbol_id))?;

        parse_candles_response(&body)
    }

    /// Fetch the current quote record for a symbol.
    pub fn get_quote(&self, symbol_id: u64, api_version: &str) -> FetchResult<Value> {
        let path = format!("markets/quotes/{}", symbol_id);
        let url = self.endpoint_url(api_version, &path)?;

        let body = self
            .session
            .get(&url)?
            .text()
            .with_context(|| format!("Failed to read quote response for {}", symbol_id))?;

        parse_quote_response(&body)
    }

    /// Resolve a ticker to its numeric symbol id via prefix search. Only an
    /// exact match on the first returned result is accepted.
    pub fn resolve_symbol_id(&self, ticker: &str, api_version: &str) -> FetchResult<u64> {
        let path = format!("symbols/search?prefix={}", ticker);
        let url = self.endpoint_url(api_version, &path)?;

        let body = self
            .session
            .get(&url)?
            .text()
            .with_context(|| format!("Failed to read symbol search response for {}", ticker))?;

        parse_symbol_search(&body, ticker)
    }

    fn token(&self) -> FetchResult<&AccessToken> {
        self.access_token.as_ref().ok_or(ClientError::NotAuthenticated)
    }

    fn endpoint_url(&self, api_version: &str, path: &str) -> FetchResult<String> {
        let server = &self.token()?.api_server;
        Ok(format!(
            "{}/{}/{}",
            server.trim_end_matches('/'),
            api_version,
            path
        ))
    }

    fn exchange_token(&self, refresh_token: &str) -> FetchResult<AccessToken> {
        let url = format!(
            "{}/oauth2/token?grant_type=refresh_token&refresh_token={}",
            self.login_url, refresh_token
        );

        let body = self
            .session
            .get(&url)?
            .text()
            .context("Failed to read token exchange response")?;

        parse_token_response(&body)
    }

    /// Swap the session for one carrying the token's `Authorization` header,
    /// so every subsequent call on this client is authenticated.
    fn install_token(&mut self, token: AccessToken) -> FetchResult<()> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&token.authorization_value())
            .map_err(|_| ClientError::message("Access token is not a valid header value"))?;
        headers.insert(AUTHORIZATION, value);

        self.session = Session::with_default_headers(self.session.policy().clone(), headers)?;
        self.access_token = Some(token);

        log::debug!("Installed access token for {}", self.token()?.api_server);
        Ok(())
    }
}

fn candle_bound(date: NaiveDate) -> String {
    format!("{}T00:00:00-05:00", date.format("%Y-%m-%d"))
}

fn parse_token_response(body: &str) -> FetchResult<AccessToken> {
    if body == BAD_REQUEST_BODY {
        return Err(ClientError::Authentication(
            "the brokerage rejected the refresh token".to_string(),
        ));
    }

    let token: AccessToken =
        serde_json::from_str(body).context("Failed to parse token exchange response")?;
    Ok(token)
}

fn parse_candles_response(body: &str) -> FetchResult<Vec<Candle>> {
    let parsed: CandlesResponse = serde_json::from_str(body)?;

    parsed
        .candles
        .ok_or_else(|| ClientError::ResponseShape("candles".to_string()))
}

fn parse_quote_response(body: &str) -> FetchResult<Value> {
    let root: Value = serde_json::from_str(body)?;

    root.get("quotes")
        .and_then(Value::as_array)
        .and_then(|quotes| quotes.first())
        .cloned()
        .ok_or_else(|| ClientError::ResponseShape("quotes".to_string()))
}

fn parse_symbol_search(body: &str, ticker: &str) -> FetchResult<u64> {
    let root: Value = serde_json::from_str(body)?;
    let symbols = root
        .get("symbols")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::ResponseShape("symbols".to_string()))?;

    // The search endpoint returns prefix matches; anything other than an
    // exact symbol on the first result is rejected, even if an exact match
    // appears later in the list.
    let first = symbols
        .first()
        .ok_or_else(|| ClientError::NoExactMatch(ticker.to_string()))?;

    if first.get("symbol").and_then(Value::as_str) != Some(ticker) {
        return Err(ClientError::NoExactMatch(ticker.to_string()));
    }

    first
        .get("symbolId")
        .and_then(Value::as_u64)
        .ok_or_else(|| ClientError::ResponseShape("symbolId".to_string()))
}
