//! `zia_traffic_forwarding_static_ip`: static IPs used for GRE tunnels and
//! location traffic forwarding.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::crud::{Lifecycle, ResourceKind};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, ValueValidator};
use crate::state::StateReader;

/// Static IP body as exchanged with `/staticIP`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct StaticIp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub geo_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, rename = "routableIP")]
    pub routable_ip: bool,
}

/// Static IPs.
pub struct StaticIpKind;

impl ResourceKind for StaticIpKind {
    const TYPE_NAME: &'static str = "zia_traffic_forwarding_static_ip";
    const PATH: &'static str = "/staticIP";
    const LIFECYCLE: Lifecycle = Lifecycle::Collection;
    const NAME_ATTRIBUTE: &'static str = "ip_address";

    type Model = StaticIp;
    type Id = i64;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A static IP address for traffic forwarding")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "ip_address",
                Attribute::required_string()
                    .with_validator(ValueValidator::IpAddress)
                    .with_force_new(),
            )
            .with_attribute(
                "comment",
                Attribute::optional_string()
                    .with_validator(ValueValidator::LengthBetween { min: 0, max: 10240 }),
            )
            .with_attribute(
                "geo_override",
                Attribute::optional_bool()
                    .with_description("Use latitude and longitude instead of IP geolocation"),
            )
            .with_attribute("latitude", Attribute::optional_float64())
            .with_attribute("longitude", Attribute::optional_float64())
            .with_attribute(
                "routable_ip",
                Attribute::optional_bool().with_default(json!(true)),
            )
    }

    fn expand(state: &Value) -> Result<StaticIp, ProviderError> {
        let r = StateReader::new(state);
        let geo_override = r.bool("geo_override").unwrap_or(false);
        let latitude = r.float("latitude");
        let longitude = r.float("longitude");

        if geo_override {
            match (latitude, longitude) {
                (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {},
                (Some(_), Some(_)) => {
                    return Err(ProviderError::Validation(
                        "latitude must be within [-90, 90] and longitude within [-180, 180]"
                            .to_string(),
                    ))
                },
                _ => {
                    return Err(ProviderError::Validation(
                        "geo_override requires latitude and longitude".to_string(),
                    ))
                },
            }
        }

        Ok(StaticIp {
            id: None,
            ip_address: r.require_string("ip_address")?,
            comment: r.string("comment"),
            geo_override,
            latitude: latitude.filter(|_| geo_override),
            longitude: longitude.filter(|_| geo_override),
            routable_ip: r.bool("routable_ip").unwrap_or(true),
        })
    }

    fn flatten(ip: &StaticIp) -> Value {
        json!({
            "ip_address": ip.ip_address,
            "comment": ip.comment.clone().unwrap_or_default(),
            "geo_override": ip.geo_override,
            "latitude": ip.latitude,
            "longitude": ip.longitude,
            "routable_ip": ip.routable_ip,
        })
    }

    fn id(ip: &StaticIp) -> Option<i64> {
        ip.id
    }

    fn assign_id(ip: &mut StaticIp, id: &i64) {
        ip.id = Some(*id);
    }

    fn differs(desired: &StaticIp, remote: &StaticIp) -> bool {
        // Coordinates are derived by the API unless overridden.
        let coordinates_differ = desired.geo_override
            && (desired.latitude != remote.latitude || desired.longitude != remote.longitude);
        desired.ip_address != remote.ip_address
            || desired.comment.as_deref().unwrap_or_default()
                != remote.comment.as_deref().unwrap_or_default()
            || desired.geo_override != remote.geo_override
            || desired.routable_ip != remote.routable_ip
            || coordinates_differ
    }

    fn name(ip: &StaticIp) -> Option<&str> {
        Some(&ip.ip_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    #[test]
    fn test_expand_wire_shape() {
        let ip = StaticIpKind::expand(&json!({"ip_address": "203.0.113.10", "comment": "HQ"})).unwrap();
        let body = serde_json::to_value(&ip).unwrap();
        assert_eq!(body["ipAddress"], json!("203.0.113.10"));
        assert_eq!(body["routableIP"], json!(true));
        assert!(body.get("latitude").is_none());
    }

    #[test]
    fn test_geo_override_needs_coordinates() {
        let err = StaticIpKind::expand(&json!({"ip_address": "203.0.113.10", "geo_override": true}))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));

        let err = StaticIpKind::expand(&json!({
            "ip_address": "203.0.113.10", "geo_override": true, "latitude": 95.0, "longitude": 0.0
        }))
        .unwrap_err();
        assert!(err.message().contains("latitude"));

        let ip = StaticIpKind::expand(&json!({
            "ip_address": "203.0.113.10", "geo_override": true, "latitude": 37.4, "longitude": -122.1
        }))
        .unwrap();
        assert_eq!(ip.latitude, Some(37.4));
    }

    #[test]
    fn test_api_derived_coordinates_are_not_a_change() {
        let desired = StaticIpKind::expand(&json!({"ip_address": "203.0.113.10"})).unwrap();
        let mut remote = desired.clone();
        remote.id = Some(4);
        remote.latitude = Some(37.4);
        remote.longitude = Some(-122.1);
        assert!(!StaticIpKind::differs(&desired, &remote));
    }

    #[test]
    fn test_ip_address_is_validated_and_force_new() {
        let schema = StaticIpKind::schema();
        assert!(schema.block.attributes["ip_address"].force_new);
        assert!(validate(&schema, &json!({"ip_address": "203.0.113.10"})).is_empty());
        assert_eq!(validate(&schema, &json!({"ip_address": "not-an-ip"})).len(), 1);
    }
}
