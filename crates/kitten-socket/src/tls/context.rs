use std::{
    path::Path,
    sync::{Arc, OnceLock},
};

use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime, pem::PemObject};
use tracing::{debug, warn};

use crate::{error::TransportError, options::ConnectOptions};

static PROVIDER: OnceLock<Arc<CryptoProvider>> = OnceLock::new();

/// 进程级的加密算法提供者，只初始化一次。
///
/// 若进程内已经安装了默认提供者则沿用它，否则使用 `aws-lc-rs`。之后的每次建连都复用同一实例，
/// 不会重复初始化。
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::clone(PROVIDER.get_or_init(|| match CryptoProvider::get_default() {
        Some(installed) => {
            debug!("tls: reusing process default crypto provider");
            Arc::clone(installed)
        }
        None => {
            debug!("tls: initialising aws-lc-rs crypto provider");
            Arc::new(rustls::crypto::aws_lc_rs::default_provider())
        }
    }))
}

/// 一次建连所需的 TLS 配置与服务器名。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 把“选项 → rustls 配置”的全部失败点集中在握手之前，失败统一报告为
///   `TlsContextCreateFailed`，与握手本身的失败区分开。
///
/// ## 逻辑（How）
/// 1. 服务器名取调用方给出的主机名（而不是回环改写后的地址），用于 SNI 与证书校验；
/// 2. `invalidCertificateAllowed = true`：安装接受任意证书链的校验器，但握手签名仍用提供者的算法校验；
/// 3. 提供了 `CAFile`：以 PEM 读取全部证书作为唯一的信任锚，文件不可读、不可解析或为空都失败；
/// 4. 未提供 `CAFile`：使用随二进制编译进来的 Mozilla 根证书（`webpki-roots`）。
///
/// ## 注意事项（Trade-offs）
/// - 内置根证书与构建时的 `webpki-roots` 版本绑定，不读取操作系统信任库；
///   私有 CA 签发的服务端证书必须通过 `CAFile` 显式信任。
#[derive(Clone, Debug)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
}

impl TlsContext {
    pub fn new(config: Arc<ClientConfig>, server_name: ServerName<'static>) -> Self {
        Self {
            config,
            server_name,
        }
    }

    pub fn from_options(host: &str, options: &ConnectOptions) -> Result<Self, TransportError> {
        let provider = crypto_provider();
        let server_name = ServerName::try_from(host.to_owned()).map_err(|error| {
            TransportError::tls_context_with(format!("invalid server name `{host}`"), error)
        })?;
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|error| {
                TransportError::tls_context_with("no usable protocol versions", error)
            })?;

        let config = if options.invalid_certificate_allowed {
            warn!(host, "tls: certificate verification disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
                .with_no_client_auth()
        } else {
            let roots = match options.ca_file.as_deref() {
                Some(ca_file) => load_roots(ca_file)?,
                None => bundled_roots(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        };

        Ok(Self::new(Arc::new(config), server_name))
    }

    pub fn config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }

    pub fn server_name(&self) -> ServerName<'static> {
        self.server_name.clone()
    }
}

fn load_roots(path: &Path) -> Result<RootCertStore, TransportError> {
    let certificates = CertificateDer::pem_file_iter(path).map_err(|error| {
        TransportError::tls_context_with(format!("cannot read CAFile {}", path.display()), error)
    })?;
    let mut roots = RootCertStore::empty();
    for certificate in certificates {
        let certificate = certificate.map_err(|error| {
            TransportError::tls_context_with(format!("malformed CAFile {}", path.display()), error)
        })?;
        roots.add(certificate).map_err(|error| {
            TransportError::tls_context_with(
                format!("rejected trust anchor in {}", path.display()),
                error,
            )
        })?;
    }
    if roots.is_empty() {
        return Err(TransportError::tls_context(format!(
            "CAFile {} contains no certificates",
            path.display()
        )));
    }
    debug!(ca_file = %path.display(), anchors = roots.len(), "tls: loaded trust anchors");
    Ok(roots)
}

fn bundled_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    debug!(anchors = roots.len(), "tls: no CAFile, using bundled webpki roots");
    roots
}

/// 跳过证书链校验、保留签名校验的校验器。
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
