/**
 * DÉCODEURS DE SCHÉMA - payload brut -> champs typés
 *
 * STRATÉGIES :
 * 1. decode_report : objet JSON complet (H&T /info)
 * 2. probe_method + decode_rpc : enveloppe RPC filtrée sur `method` (H&T Gen3)
 * 3. decode_scalar + ScalarTopic : littéral numérique, mesure déduite du topic (3EM)
 *
 * Aucun décodeur ne touche à l'état d'agrégation.
 */

use crate::error::DecodeError;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Notification RPC retenue par les appareils Gen2+/Gen3
pub const NOTIFY_FULL_STATUS: &str = "NotifyFullStatus";

pub fn decode_report<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(payload).map_err(|e| DecodeError::json(e, payload))
}

#[derive(Deserialize)]
struct MethodProbe<'a> {
    #[serde(borrow)]
    method: Option<std::borrow::Cow<'a, str>>,
}

/// Lit seulement le discriminant `method`, sans décoder le reste de l'enveloppe.
pub fn probe_method(payload: &[u8]) -> Option<String> {
    serde_json::from_slice::<MethodProbe<'_>>(payload)
        .ok()
        .and_then(|p| p.method)
        .map(|m| m.into_owned())
}

/// Décode une enveloppe RPC ; `Ok(None)` si la méthode n'est pas celle attendue.
pub fn decode_rpc<T: DeserializeOwned + RpcEnvelope>(
    payload: &[u8],
    method: &str,
) -> Result<Option<T>, DecodeError> {
    let envelope: T = decode_report(payload)?;
    if envelope.method() != method {
        return Ok(None);
    }
    Ok(Some(envelope))
}

pub trait RpcEnvelope {
    fn method(&self) -> &str;
}

pub fn decode_scalar(payload: &[u8]) -> Result<f64, DecodeError> {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| DecodeError::scalar(payload))
}

/// `<namespace>/<device>/<group>/<phase>/<measurement>`, ou sans groupe :
/// `<namespace>/<device>/<phase>/<measurement>`. Le device est toujours le
/// deuxième segment, phase et mesure les deux derniers ; moins de 4 segments = `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarTopic<'a> {
    pub device: &'a str,
    pub phase: &'a str,
    pub measurement: &'a str,
}

impl<'a> ScalarTopic<'a> {
    /// Le préfixe de classe (ex: `shellyem3-`) est retiré de l'identité appareil s'il est présent.
    pub fn parse(topic: &'a str, device_prefix: &str) -> Option<Self> {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() < 4 {
            return None;
        }
        let raw_device = parts[1];
        let device = raw_device.strip_prefix(device_prefix).unwrap_or(raw_device);
        Some(Self {
            device,
            phase: parts[parts.len() - 2],
            measurement: parts[parts.len() - 1],
        })
    }
}
