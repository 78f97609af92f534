//! Clinical input parameters for runoff risk prediction.
//!
//! Six bounded measurements: three ordinal grades and three continuous readings.
//! Every write is clamped to the parameter's range and snapped to its step grid,
//! so a `ClinicalParameters` value is always within bounds.

use serde::{Deserialize, Serialize};

/// Whether a parameter moves in whole units or along a decimal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Ordinal grade (integer steps)
    Ordinal,
    /// Continuous measurement (decimal steps)
    Continuous,
}

/// Static description of one input control.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    /// Column name the trained model was fit on
    pub column: &'static str,
    pub label: &'static str,
    pub help: &'static str,
    pub kind: ParameterKind,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub step: f64,
    /// Decimal places shown and kept (0 for ordinal grades)
    pub decimals: u32,
}

impl ParameterSpec {
    /// Clamp to `[min, max]` and snap to the step grid.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.default;
        }
        let clamped = value.clamp(self.min, self.max);
        let steps = ((clamped - self.min) / self.step).round();
        let snapped = self.min + steps * self.step;
        let rounded = match self.kind {
            ParameterKind::Ordinal => snapped.round(),
            ParameterKind::Continuous => {
                let scale = 10f64.powi(self.decimals as i32);
                (snapped * scale).round() / scale
            }
        };
        rounded.clamp(self.min, self.max)
    }

    /// Format a value with this parameter's precision.
    #[must_use]
    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.decimals as usize, value)
    }

    /// Position of `value` within the range, in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

const STENOSIS_HELP: &str = "1: 0-49%, 2: 50-69%, 3: 70-99%, 4: 100%";

/// Identifies one of the six inputs, in model column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterId {
    PoplitealStenosis,
    InfrapoplitealStenosis,
    Rutherford,
    Abi,
    TcPo2,
    Egfr,
}

impl ParameterId {
    /// All parameters in model column order.
    pub const ALL: [ParameterId; 6] = [
        ParameterId::PoplitealStenosis,
        ParameterId::InfrapoplitealStenosis,
        ParameterId::Rutherford,
        ParameterId::Abi,
        ParameterId::TcPo2,
        ParameterId::Egfr,
    ];

    /// Static control description for this parameter.
    #[must_use]
    pub fn spec(self) -> &'static ParameterSpec {
        match self {
            Self::PoplitealStenosis => &POPLITEAL_STENOSIS,
            Self::InfrapoplitealStenosis => &INFRAPOPLITEAL_STENOSIS,
            Self::Rutherford => &RUTHERFORD,
            Self::Abi => &ABI,
            Self::TcPo2 => &TCPO2,
            Self::Egfr => &EGFR,
        }
    }

    /// Index of this parameter in the feature row.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::PoplitealStenosis => 0,
            Self::InfrapoplitealStenosis => 1,
            Self::Rutherford => 2,
            Self::Abi => 3,
            Self::TcPo2 => 4,
            Self::Egfr => 5,
        }
    }
}

static POPLITEAL_STENOSIS: ParameterSpec = ParameterSpec {
    column: "degree_of_popliteal_artery_stenosis",
    label: "Degree of Popliteal Artery Stenosis (1-4)",
    help: STENOSIS_HELP,
    kind: ParameterKind::Ordinal,
    min: 1.0,
    max: 4.0,
    default: 2.0,
    step: 1.0,
    decimals: 0,
};

static INFRAPOPLITEAL_STENOSIS: ParameterSpec = ParameterSpec {
    column: "degree_of_infrapopliteal_arteries_stenosis",
    label: "Degree of Infrapopliteal Arteries Stenosis (1-4)",
    help: STENOSIS_HELP,
    kind: ParameterKind::Ordinal,
    min: 1.0,
    max: 4.0,
    default: 2.0,
    step: 1.0,
    decimals: 0,
};

static RUTHERFORD: ParameterSpec = ParameterSpec {
    column: "Rutherford",
    label: "Rutherford Classification (1-6)",
    help: "1: Mild claudication, 2: Moderate claudication, 3: Severe claudication, \
           4: Rest pain, 5: Moderate Tissue loss, 6: Severe Tissue loss",
    kind: ParameterKind::Ordinal,
    min: 1.0,
    max: 6.0,
    default: 3.0,
    step: 1.0,
    decimals: 0,
};

static ABI: ParameterSpec = ParameterSpec {
    column: "ABI",
    label: "Ankle-Brachial Index (ABI)",
    help: "Normal range: 0.9-1.3",
    kind: ParameterKind::Continuous,
    min: 0.0,
    max: 1.5,
    default: 0.8,
    step: 0.01,
    decimals: 2,
};

static TCPO2: ParameterSpec = ParameterSpec {
    column: "TcPO2",
    label: "Transcutaneous Oxygen Pressure (TcPO2, mmHg)",
    help: "Normal value: >60 mmHg",
    kind: ParameterKind::Continuous,
    min: 0.0,
    max: 100.0,
    default: 40.0,
    step: 0.1,
    decimals: 1,
};

static EGFR: ParameterSpec = ParameterSpec {
    column: "eGFR",
    label: "Estimated Glomerular Filtration Rate (eGFR, mL/min/1.73m²)",
    help: "Normal value: ≥90",
    kind: ParameterKind::Continuous,
    min: 0.0,
    max: 150.0,
    default: 60.0,
    step: 0.1,
    decimals: 1,
};

/// The six clinical measurements collected by the input form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClinicalParameters {
    /// Popliteal artery stenosis grade (1-4)
    pub popliteal_stenosis: u8,

    /// Infrapopliteal arteries stenosis grade (1-4)
    pub infrapopliteal_stenosis: u8,

    /// Rutherford classification (1-6)
    pub rutherford: u8,

    /// Ankle-brachial index (0.0-1.5)
    pub abi: f64,

    /// Transcutaneous oxygen pressure in mmHg (0-100)
    pub tcpo2: f64,

    /// Estimated glomerular filtration rate in mL/min/1.73m² (0-150)
    pub egfr: f64,
}

impl Default for ClinicalParameters {
    fn default() -> Self {
        Self {
            popliteal_stenosis: POPLITEAL_STENOSIS.default as u8,
            infrapopliteal_stenosis: INFRAPOPLITEAL_STENOSIS.default as u8,
            rutherford: RUTHERFORD.default as u8,
            abi: ABI.default,
            tcpo2: TCPO2.default,
            egfr: EGFR.default,
        }
    }
}

impl ClinicalParameters {
    /// Build a parameter set, clamping each value into its range.
    #[must_use]
    pub fn new(
        popliteal_stenosis: u8,
        infrapopliteal_stenosis: u8,
        rutherford: u8,
        abi: f64,
        tcpo2: f64,
        egfr: f64,
    ) -> Self {
        let mut params = Self::default();
        params.set(ParameterId::PoplitealStenosis, f64::from(popliteal_stenosis));
        params.set(ParameterId::InfrapoplitealStenosis, f64::from(infrapopliteal_stenosis));
        params.set(ParameterId::Rutherford, f64::from(rutherford));
        params.set(ParameterId::Abi, abi);
        params.set(ParameterId::TcPo2, tcpo2);
        params.set(ParameterId::Egfr, egfr);
        params
    }

    /// Current value of a parameter.
    #[must_use]
    pub fn get(&self, id: ParameterId) -> f64 {
        match id {
            ParameterId::PoplitealStenosis => f64::from(self.popliteal_stenosis),
            ParameterId::InfrapoplitealStenosis => f64::from(self.infrapopliteal_stenosis),
            ParameterId::Rutherford => f64::from(self.rutherford),
            ParameterId::Abi => self.abi,
            ParameterId::TcPo2 => self.tcpo2,
            ParameterId::Egfr => self.egfr,
        }
    }

    /// Set a parameter; the value is clamped and snapped to the step grid.
    pub fn set(&mut self, id: ParameterId, value: f64) {
        let v = id.spec().normalize(value);
        match id {
            ParameterId::PoplitealStenosis => self.popliteal_stenosis = v as u8,
            ParameterId::InfrapoplitealStenosis => self.infrapopliteal_stenosis = v as u8,
            ParameterId::Rutherford => self.rutherford = v as u8,
            ParameterId::Abi => self.abi = v,
            ParameterId::TcPo2 => self.tcpo2 = v,
            ParameterId::Egfr => self.egfr = v,
        }
    }

    /// Move a parameter by a whole number of steps.
    pub fn nudge(&mut self, id: ParameterId, steps: i32) {
        let spec = id.spec();
        let next = self.get(id) + f64::from(steps) * spec.step;
        self.set(id, next);
    }

    pub fn set_to_min(&mut self, id: ParameterId) {
        self.set(id, id.spec().min);
    }

    pub fn set_to_max(&mut self, id: ParameterId) {
        self.set(id, id.spec().max);
    }

    /// Restore every parameter to its default.
    pub fn reset_defaults(&mut self) {
        *self = Self::default();
    }
}
