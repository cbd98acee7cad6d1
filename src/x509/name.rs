//! Distinguished name rendering.

use std::collections::BTreeMap;

use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::Name;

/// Render a DN as `key=value,key=value` in encoded order, using short names
/// for well-known attributes and dotted OIDs for the rest.
#[must_use]
pub fn dn_to_string(name: &Name) -> String {
    attributes(name).map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",")
}

/// The attributes of a DN keyed by short name. Repeated attributes keep the
/// last value.
#[must_use]
pub fn dn_to_map(name: &Name) -> BTreeMap<String, String> {
    attributes(name).collect()
}

fn attributes(name: &Name) -> impl Iterator<Item = (String, String)> + '_ {
    name.0.iter().flat_map(|rdn| rdn.0.iter()).map(|atv| (short_name(atv), value(atv)))
}

fn short_name(atv: &AttributeTypeAndValue) -> String {
    let name = match atv.oid.to_string().as_str() {
        "2.5.4.3" => "CN",
        "2.5.4.4" => "SN",
        "2.5.4.5" => "serialNumber",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.9" => "street",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "2.5.4.12" => "T",
        "2.5.4.42" => "GN",
        "1.2.840.113549.1.9.1" => "E",
        "0.9.2342.19200300.100.1.25" => "DC",
        other => return other.to_string(),
    };
    name.to_string()
}

// string types are all ASCII or UTF-8 on the wire
fn value(atv: &AttributeTypeAndValue) -> String {
    let bytes = atv.value.value();
    std::str::from_utf8(bytes)
        .map_or_else(|_| format!("#{}", hex::encode(bytes)), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use x509_cert::name::RdnSequence;

    use super::*;

    #[test]
    fn rendered_in_encoded_order() {
        // RFC 4514 strings list RDNs in reverse encoding order
        let name =
            RdnSequence::from_str("CN=Test Root CA,O=Sphinx Labs,C=NL").expect("should parse");
        assert_eq!(dn_to_string(&name), "C=NL,O=Sphinx Labs,CN=Test Root CA");

        let map = dn_to_map(&name);
        assert_eq!(map.get("O").map(String::as_str), Some("Sphinx Labs"));
        assert_eq!(map.len(), 3);
    }
}
