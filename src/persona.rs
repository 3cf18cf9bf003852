use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::prompts;

/// Jurisdictions the assistant can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum Country {
    Kenya,
    Uganda,
    Tanzania,
}

impl Country {
    pub fn name(&self) -> &'static str {
        match self {
            Country::Kenya => "Kenya",
            Country::Uganda => "Uganda",
            Country::Tanzania => "Tanzania",
        }
    }

    pub fn motto(&self) -> &'static str {
        match self {
            Country::Kenya => "Sheria • Haki • Uwazi",
            Country::Uganda => "For God and My Country",
            Country::Tanzania => "Uhuru na Umoja",
        }
    }

    pub fn flag_url(&self) -> &'static str {
        match self {
            Country::Kenya => "https://flagcdn.com/w80/ke.png",
            Country::Uganda => "https://flagcdn.com/w80/ug.png",
            Country::Tanzania => "https://flagcdn.com/w80/tz.png",
        }
    }

    /// Case-insensitive lookup by name
    pub fn find(name: &str) -> Option<Country> {
        let wanted = name.trim();
        Country::iter().find(|c| c.name().eq_ignore_ascii_case(wanted))
    }
}

impl Default for Country {
    fn default() -> Self {
        Country::Kenya
    }
}

/// The active assistant persona. The instruction text is derived from the
/// country name and never edited independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    country_name: String,
    motto: String,
    system_instruction: String,
}

impl Persona {
    pub fn new(country_name: impl Into<String>, motto: impl Into<String>) -> Self {
        let country_name = country_name.into();
        let system_instruction = prompts::mandate_prompt(&country_name);
        Self {
            country_name,
            motto: motto.into(),
            system_instruction,
        }
    }

    pub fn for_country(country: Country) -> Self {
        Self::new(country.name(), country.motto())
    }

    pub fn country_name(&self) -> &str {
        &self.country_name
    }

    pub fn motto(&self) -> &str {
        &self.motto
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::for_country(Country::default())
    }
}
