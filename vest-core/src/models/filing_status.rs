use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilingStatusCode {
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
    QualifyingSurvivingSpouse,
}

impl FilingStatusCode {
    pub fn all() -> [Self; 5] {
        [
            Self::Single,
            Self::MarriedFilingJointly,
            Self::MarriedFilingSeparately,
            Self::HeadOfHousehold,
            Self::QualifyingSurvivingSpouse,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "S",
            Self::MarriedFilingJointly => "MFJ",
            Self::MarriedFilingSeparately => "MFS",
            Self::HeadOfHousehold => "HOH",
            Self::QualifyingSurvivingSpouse => "QSS",
        }
    }

    /// Parses a short code (`S`, `MFJ`, ...) or one of the long-form names
    /// used by older profile exports (`single`, `married_joint`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "S" | "single" => Some(Self::Single),
            "MFJ" | "married_joint" => Some(Self::MarriedFilingJointly),
            "MFS" | "married_separate" => Some(Self::MarriedFilingSeparately),
            "HOH" | "head_of_household" => Some(Self::HeadOfHousehold),
            "QSS" | "qualifying_surviving_spouse" => Some(Self::QualifyingSurvivingSpouse),
            _ => None,
        }
    }
}

/// One value per filing status.
///
/// Year constants such as the Additional Medicare threshold or the AMT
/// exemption differ by filing status; holding them in a struct with a field
/// per status makes every lookup total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByFilingStatus<T> {
    pub single: T,
    pub married_filing_jointly: T,
    pub married_filing_separately: T,
    pub head_of_household: T,
    pub qualifying_surviving_spouse: T,
}

impl<T> ByFilingStatus<T> {
    pub fn get(&self, status: FilingStatusCode) -> &T {
        match status {
            FilingStatusCode::Single => &self.single,
            FilingStatusCode::MarriedFilingJointly => &self.married_filing_jointly,
            FilingStatusCode::MarriedFilingSeparately => &self.married_filing_separately,
            FilingStatusCode::HeadOfHousehold => &self.head_of_household,
            FilingStatusCode::QualifyingSurvivingSpouse => &self.qualifying_surviving_spouse,
        }
    }

    pub fn map<U>(
        &self,
        mut f: impl FnMut(&T) -> U,
    ) -> ByFilingStatus<U> {
        ByFilingStatus {
            single: f(&self.single),
            married_filing_jointly: f(&self.married_filing_jointly),
            married_filing_separately: f(&self.married_filing_separately),
            head_of_household: f(&self.head_of_household),
            qualifying_surviving_spouse: f(&self.qualifying_surviving_spouse),
        }
    }

    /// Builds the table by calling `f` once per status, in [`FilingStatusCode::all`] order.
    pub fn try_from_fn<E>(mut f: impl FnMut(FilingStatusCode) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            single: f(FilingStatusCode::Single)?,
            married_filing_jointly: f(FilingStatusCode::MarriedFilingJointly)?,
            married_filing_separately: f(FilingStatusCode::MarriedFilingSeparately)?,
            head_of_household: f(FilingStatusCode::HeadOfHousehold)?,
            qualifying_surviving_spouse: f(FilingStatusCode::QualifyingSurvivingSpouse)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_round_trips_short_codes() {
        for status in FilingStatusCode::all() {
            assert_eq!(FilingStatusCode::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn parse_accepts_long_form_names() {
        assert_eq!(
            FilingStatusCode::parse("married_joint"),
            Some(FilingStatusCode::MarriedFilingJointly)
        );
        assert_eq!(
            FilingStatusCode::parse("single"),
            Some(FilingStatusCode::Single)
        );
    }

    #[test]
    fn parse_rejects_unknown_code() {
        assert_eq!(FilingStatusCode::parse("XYZ"), None);
        assert_eq!(FilingStatusCode::parse("s"), None);
    }

    #[test]
    fn by_filing_status_get_returns_matching_field() {
        let table = ByFilingStatus::try_from_fn::<()>(|s| Ok(s.as_str())).unwrap();

        assert_eq!(*table.get(FilingStatusCode::HeadOfHousehold), "HOH");
        assert_eq!(*table.get(FilingStatusCode::QualifyingSurvivingSpouse), "QSS");
    }

    #[test]
    fn try_from_fn_propagates_first_error() {
        let result = ByFilingStatus::try_from_fn(|s| {
            if s == FilingStatusCode::MarriedFilingSeparately {
                Err(s)
            } else {
                Ok(1)
            }
        });

        assert_eq!(result, Err(FilingStatusCode::MarriedFilingSeparately));
    }
}
