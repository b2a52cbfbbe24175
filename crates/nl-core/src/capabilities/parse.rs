//! Descriptor decoding.
//!
//! Each parser checks the document's root element before decoding, so a
//! descriptor handed to the wrong parser fails instead of silently decoding
//! to an empty structure.

use super::schema::{DomainCapabilities, FeatureList, HostCapabilities};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

/// The three descriptor categories the probe writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    HostCapabilities,
    DomainCapabilities,
    FeatureList,
}

impl Descriptor {
    /// File name inside the capabilities directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Descriptor::HostCapabilities => "capabilities.xml",
            Descriptor::DomainCapabilities => "virsh_domcapabilities.xml",
            Descriptor::FeatureList => "supported_features.xml",
        }
    }

    /// Expected root element.
    pub fn root_element(self) -> &'static str {
        match self {
            Descriptor::HostCapabilities => "capabilities",
            Descriptor::DomainCapabilities => "domainCapabilities",
            Descriptor::FeatureList => "cpu",
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Descriptor::HostCapabilities => "host capabilities",
            Descriptor::DomainCapabilities => "domain capabilities",
            Descriptor::FeatureList => "cpu feature list",
        };
        f.write_str(name)
    }
}

/// Errors decoding a descriptor.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{descriptor} descriptor is empty")]
    Empty { descriptor: Descriptor },

    #[error("{descriptor} descriptor is not well-formed: {source}")]
    Markup {
        descriptor: Descriptor,
        #[source]
        source: quick_xml::Error,
    },

    #[error("{descriptor} descriptor has root <{found}>, expected <{expected}>")]
    UnexpectedRoot {
        descriptor: Descriptor,
        expected: &'static str,
        found: String,
    },

    #[error("{descriptor} descriptor does not match its schema: {source}")]
    Schema {
        descriptor: Descriptor,
        #[source]
        source: quick_xml::DeError,
    },
}

impl ParseError {
    pub fn descriptor(&self) -> Descriptor {
        match self {
            ParseError::Empty { descriptor }
            | ParseError::Markup { descriptor, .. }
            | ParseError::UnexpectedRoot { descriptor, .. }
            | ParseError::Schema { descriptor, .. } => *descriptor,
        }
    }
}

impl From<ParseError> for nl_common::Error {
    fn from(err: ParseError) -> Self {
        nl_common::Error::Parse {
            descriptor: err.descriptor().file_name().to_string(),
            message: err.to_string(),
        }
    }
}

/// Decode `capabilities.xml`.
pub fn parse_host_capabilities(text: &str) -> Result<HostCapabilities, ParseError> {
    parse(Descriptor::HostCapabilities, text)
}

/// Decode `virsh_domcapabilities.xml`.
pub fn parse_domain_capabilities(text: &str) -> Result<DomainCapabilities, ParseError> {
    parse(Descriptor::DomainCapabilities, text)
}

/// Decode `supported_features.xml`.
pub fn parse_feature_list(text: &str) -> Result<FeatureList, ParseError> {
    parse(Descriptor::FeatureList, text)
}

fn parse<T: DeserializeOwned>(descriptor: Descriptor, text: &str) -> Result<T, ParseError> {
    let root = first_element(text)
        .map_err(|source| ParseError::Markup { descriptor, source })?
        .ok_or(ParseError::Empty { descriptor })?;

    if root != descriptor.root_element() {
        return Err(ParseError::UnexpectedRoot {
            descriptor,
            expected: descriptor.root_element(),
            found: root,
        });
    }

    quick_xml::de::from_str(text).map_err(|source| ParseError::Schema { descriptor, source })
}

/// Name of the first element in the document, skipping the prolog.
fn first_element(text: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(Some(String::from_utf8_lossy(e.name().as_ref()).into_owned()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = r#"<capabilities>
  <host>
    <uuid>30303030-3030-3030-3030-303030303030</uuid>
    <cpu>
      <arch>x86_64</arch>
      <model>Skylake-Client-IBRS</model>
      <vendor>Intel</vendor>
      <counter name='tsc' frequency='4008012000' scaling='no'/>
      <feature name='ds'/>
    </cpu>
  </host>
</capabilities>"#;

    const NUMA: &str = r#"<capabilities>
  <host>
    <cpu><arch>x86_64</arch></cpu>
    <topology>
      <cells num='2'>
        <cell id='0'>
          <memory unit='KiB'>1048576</memory>
          <pages unit='KiB' size='4'>262144</pages>
          <pages unit='KiB' size='2048'>0</pages>
          <distances>
            <sibling id='0' value='10'/>
            <sibling id='1' value='21'/>
          </distances>
          <cpus num='2'>
            <cpu id='0' socket_id='0' die_id='0' core_id='0' siblings='0'/>
            <cpu id='1' socket_id='0' die_id='0' core_id='1' siblings='1'/>
          </cpus>
        </cell>
        <cell id='1'>
          <memory unit='KiB'>1048576</memory>
          <cpus num='1'>
            <cpu id='2' socket_id='1' die_id='0' core_id='0' siblings='2'/>
          </cpus>
        </cell>
      </cells>
    </topology>
  </host>
</capabilities>"#;

    const DOMAIN: &str = r#"<domainCapabilities>
  <path>/usr/bin/qemu-system-x86_64</path>
  <arch>x86_64</arch>
  <cpu>
    <mode name='host-passthrough' supported='yes'/>
    <mode name='host-model' supported='yes'>
      <model fallback='forbid'>Skylake-Client-IBRS</model>
      <vendor>Intel</vendor>
      <feature policy='require' name='ss'/>
      <feature policy='disable' name='hle'/>
    </mode>
    <mode name='custom' supported='yes'>
      <model usable='yes'>Penryn</model>
      <model usable='no'>Icelake-Server</model>
      <model>Opteron_G1</model>
    </mode>
  </cpu>
  <features>
    <gic supported='no'/>
    <sev supported='yes'>
      <cbitpos>47</cbitpos>
      <reducedPhysBits>1</reducedPhysBits>
      <maxGuests>15</maxGuests>
      <maxESGuests>0</maxESGuests>
    </sev>
  </features>
</domainCapabilities>"#;

    #[test]
    fn test_parse_host_counter() {
        let host = parse_host_capabilities(HOST).unwrap();
        let tsc = host.tsc_counter().unwrap();
        assert_eq!(tsc.frequency, 4_008_012_000);
        assert!(!tsc.is_scalable());
        assert_eq!(host.host.cpu.vendor.as_deref(), Some("Intel"));
        assert_eq!(host.numa_cell_count(), 0);
    }

    #[test]
    fn test_non_tsc_counter_is_ignored() {
        let text = HOST.replace("name='tsc'", "name='hpet'");
        let host = parse_host_capabilities(&text).unwrap();
        assert!(host.host.cpu.counter.is_some());
        assert!(host.tsc_counter().is_none());
    }

    #[test]
    fn test_parse_numa_topology() {
        let host = parse_host_capabilities(NUMA).unwrap();
        assert_eq!(host.numa_cell_count(), 2);

        let cell0 = &host.numa_cells()[0];
        assert_eq!(cell0.memory.as_ref().unwrap().size, 1_048_576);
        assert_eq!(cell0.pages.len(), 2);
        assert_eq!(cell0.pages[0].count, 262_144);
        assert_eq!(cell0.cpu_ids(), vec![0, 1]);
        assert_eq!(cell0.distance_to(1), Some(21));
        assert_eq!(cell0.distance_to(7), None);

        let cpu = &cell0.cpus.as_ref().unwrap().cpus[1];
        assert_eq!(cpu.core_id, Some(1));
        assert_eq!(cpu.siblings.as_deref(), Some("1"));

        assert_eq!(host.numa_cells()[1].cpu_ids(), vec![2]);
    }

    #[test]
    fn test_parse_domain_modes_in_order() {
        let domain = parse_domain_capabilities(DOMAIN).unwrap();
        let names: Vec<&str> = domain.cpu.modes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["host-passthrough", "host-model", "custom"]);

        let host_model = &domain.cpu.modes[1];
        assert!(host_model.is_host_model());
        assert_eq!(host_model.vendor.as_deref(), Some("Intel"));
        assert_eq!(host_model.models[0].name, "Skylake-Client-IBRS");
        assert!(host_model.features[0].is_required());
        assert!(!host_model.features[1].is_required());

        let custom = &domain.cpu.modes[2];
        let usable: Vec<bool> = custom.models.iter().map(|m| m.is_usable()).collect();
        assert_eq!(usable, vec![true, false, false]);
    }

    #[test]
    fn test_parse_sev_block() {
        let domain = parse_domain_capabilities(DOMAIN).unwrap();
        let sev = domain.features.sev.unwrap();
        assert_eq!(sev.supported, "yes");
        assert_eq!(sev.cbitpos, 47);
        assert_eq!(sev.max_guests, 15);
        assert_eq!(sev.max_es_guests, 0);
    }

    #[test]
    fn test_parse_feature_list() {
        let text = r#"<cpu mode='custom' match='exact'>
  <model fallback='forbid'>Skylake-Client-IBRS</model>
  <vendor>Intel</vendor>
  <feature policy='require' name='ss'/>
  <feature policy='require' name='vmx'/>
  <feature policy='disable' name='mpx'/>
</cpu>"#;
        let list = parse_feature_list(text).unwrap();
        assert_eq!(list.features.len(), 3);
        assert_eq!(list.model.unwrap().name, "Skylake-Client-IBRS");
    }

    #[test]
    fn test_empty_document() {
        let err = parse_domain_capabilities("  \n").unwrap_err();
        assert!(matches!(err, ParseError::Empty { .. }));
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let err = parse_host_capabilities(DOMAIN).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedRoot { ref found, .. } if found == "domainCapabilities"
        ));
    }

    #[test]
    fn test_mismatched_tags_are_rejected() {
        let err = parse_domain_capabilities("<domainCapabilities><cpu></mode></domainCapabilities>")
            .unwrap_err();
        assert!(matches!(err, ParseError::Markup { .. } | ParseError::Schema { .. }));
    }

    #[test]
    fn test_wrong_value_type_is_rejected() {
        let text = HOST.replace("frequency='4008012000'", "frequency='fast'");
        let err = parse_host_capabilities(&text).unwrap_err();
        assert!(matches!(err, ParseError::Schema { .. }));
    }

    #[test]
    fn test_into_common_error() {
        let err: nl_common::Error = parse_feature_list("").unwrap_err().into();
        assert_eq!(err.code(), 20);
    }
}
