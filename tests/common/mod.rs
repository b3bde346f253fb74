#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use image::{DynamicImage, ImageFormat, RgbImage};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ndarray::Array4;
use serde_json::{json, Value};

use pawpredict::auth::{JwksConfig, KeySource};
use pawpredict::{ClassifierError, ImageModel, TokenVerifier};

pub const TEST_KID: &str = "test-key-1";
pub const TEST_KEY_PEM: &str = include_str!("../fixtures/test_rsa.pem");
pub const OTHER_KEY_PEM: &str = include_str!("../fixtures/other_rsa.pem");
pub const JWKS_JSON: &str = include_str!("../fixtures/jwks.json");
pub const LABELS_JSON: &str = include_str!("../fixtures/class_indices.json");
pub const BREED_INFO_JSON: &str = include_str!("../fixtures/breed_info.json");

pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

pub fn key_set() -> JwkSet {
    serde_json::from_str(JWKS_JSON).expect("fixture JWKS parses")
}

pub fn verifier() -> TokenVerifier {
    TokenVerifier::new(KeySource::Static(key_set()), JwksConfig::default())
}

pub fn claims_for(sub: &str) -> Value {
    json!({
        "sub": sub,
        "email": format!("{}@example.com", sub),
        "name": "Test User",
        "email_verified": true,
        "exp": Utc::now().timestamp() + 3600,
        "iat": Utc::now().timestamp(),
    })
}

pub fn sign_with(claims: &Value, kid: Option<&str>, pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key parses");
    encode(&header, claims, &key).expect("token encodes")
}

pub fn token_for(sub: &str) -> String {
    sign_with(&claims_for(sub), Some(TEST_KID), TEST_KEY_PEM)
}

/// A local address that accepts and immediately drops connections, counting
/// them. Stands in for an unreachable key set endpoint.
pub async fn connection_counter() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}/.well-known/jwks.json", listener.local_addr().expect("local addr"));
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });
    (url, connections)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Png).expect("png encodes");
    buf.into_inner()
}

/// Returns fixed scores and counts how often it ran.
#[derive(Debug)]
pub struct FixedModel {
    pub scores: Vec<f32>,
    pub calls: Arc<AtomicUsize>,
}

impl FixedModel {
    pub fn new(scores: Vec<f32>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { scores, calls: Arc::clone(&calls) }, calls)
    }
}

impl ImageModel for FixedModel {
    fn run(&self, batch: Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        assert_eq!(batch.shape()[0], 1);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }

    fn output_width(&self) -> Option<usize> {
        Some(self.scores.len())
    }
}
