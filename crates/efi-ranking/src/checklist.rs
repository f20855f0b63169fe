//! Static safety checklists keyed by subsystem
//!
//! These are non-diagnostic precautions shown alongside a low-confidence
//! ranking. They never replace the ranking itself.

const BATTERY: &[&str] = &[
    "Isolate the high-voltage battery and remove the service disconnect",
    "Wear insulated gloves and eye protection rated for the pack voltage",
    "Check the pack for swelling, leaks or heat before handling",
    "Keep a Class D / lithium-rated extinguisher within reach",
];

const MOTOR: &[&str] = &[
    "Power down the vehicle and isolate HV before touching motor phases",
    "Lift the drive wheel clear of the ground before spin tests",
    "Let the motor cool before opening the housing",
];

const CHARGING: &[&str] = &[
    "Disconnect the charger from mains before inspecting the port",
    "Inspect the charging cable and connector for burn marks",
    "Do not charge a pack showing thermal or swelling faults",
];

const CONTROLLER: &[&str] = &[
    "Isolate HV and wait for controller capacitors to discharge",
    "Verify zero voltage across the DC bus with a rated meter",
    "Use ESD protection when handling controller boards",
];

const BRAKES: &[&str] = &[
    "Secure the vehicle on a stand with the drive disabled",
    "Do not road test until braking is verified on the stand",
    "Keep brake fluid off painted surfaces and skin",
];

const ELECTRICAL: &[&str] = &[
    "Disconnect the 12V auxiliary battery before working on harnesses",
    "Isolate HV if any harness runs near high-voltage components",
    "Inspect connectors for corrosion or melted housings",
];

const GENERIC: &[&str] = &[
    "Power down the vehicle and remove the key",
    "Isolate the high-voltage system before opening panels",
    "Wear insulated gloves and eye protection",
    "Escalate to a senior technician before replacing parts",
];

/// Safety actions for a subsystem; unknown or missing subsystems get the
/// generic list. Never empty.
#[must_use]
pub fn safe_checklist(subsystem: Option<&str>) -> &'static [&'static str] {
    let key = subsystem.map(|s| s.trim().to_ascii_lowercase());
    match key.as_deref() {
        Some("battery" | "bms" | "hv battery") => BATTERY,
        Some("motor" | "drivetrain" | "powertrain") => MOTOR,
        Some("charging" | "charger" | "charging port") => CHARGING,
        Some("controller" | "mcu" | "inverter") => CONTROLLER,
        Some("brakes" | "brake" | "braking") => BRAKES,
        Some("electrical" | "wiring" | "lighting") => ELECTRICAL,
        _ => GENERIC,
    }
}
