//! Logic behind the `hessian2-pack` and `hessian2-unpack` binaries.

use thiserror::Error;

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{DecodeError, EncodeError};
use crate::options::DecoderOptions;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("encode: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Usage(String),
}

/// Encodes a JSON document as one Hessian 2 value.
pub fn pack(json: &str) -> Result<Vec<u8>, CliError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let mut encoder = Encoder::new();
    encoder.encode_json(&value)?;
    Ok(encoder.into_bytes())
}

/// Decodes every value in `bytes` and renders them as pretty JSON, one
/// document per value.
pub fn unpack(bytes: &[u8], options: DecoderOptions) -> Result<String, CliError> {
    let mut decoder = Decoder::with_options(bytes, options);
    let mut out = String::new();
    while decoder.remaining() > 0 {
        let value = decoder.decode()?;
        out.push_str(&serde_json::to_string_pretty(&serde_json::Value::from(&value))?);
        out.push('\n');
    }
    Ok(out)
}

/// Parses `--max-depth N` out of the unpack arguments.
pub fn unpack_options(args: &[String]) -> Result<DecoderOptions, CliError> {
    let mut options = DecoderOptions::default();
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--max-depth" => {
                let n = args
                    .next()
                    .ok_or_else(|| CliError::Usage("--max-depth needs a value".to_string()))?;
                options.max_depth = n
                    .parse()
                    .map_err(|_| CliError::Usage(format!("invalid --max-depth: {n}")))?;
            }
            other => return Err(CliError::Usage(format!("unknown argument: {other}"))),
        }
    }
    Ok(options)
}

/// Installs the stderr log subscriber, filtered by `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
