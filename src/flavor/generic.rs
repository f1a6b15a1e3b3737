//! Flavor for documents without a dedicated processor: writes the resolved
//! XML as is.

use super::{Flavor, FlavorError, write_output};
use crate::collection::anchors::{DefaultNumbering, XrefNumbering};
use std::{path::Path, sync::Arc};

const FORMATS: &[(&str, &str)] = &[("xml", "xml"), ("presentation", "presentation.xml")];

#[derive(Debug, Default, Clone, Copy)]
pub struct Generic;

impl Flavor for Generic {
    fn name(&self) -> &str {
        "generic"
    }

    fn output_formats(&self) -> &'static [(&'static str, &'static str)] {
        FORMATS
    }

    fn uses_presentation_xml(&self, format: &str) -> bool {
        format == "presentation"
    }

    fn numbering(&self) -> Arc<dyn XrefNumbering> {
        Arc::new(DefaultNumbering)
    }

    fn convert(&self, xml: &str, format: &str, out: &Path) -> Result<(), FlavorError> {
        if self.extension(format).is_none() {
            return Err(FlavorError::UnsupportedFormat {
                flavor: self.name().to_owned(),
                format: format.to_owned(),
            });
        }
        write_output(out, xml)
    }
}
