//! The road-emergency scenario resilience network.
//!
//! Eleven incident factors feed three capacities (absorption, adaption,
//! recovery), which feed the scenario's overall resilience.

/// Node names used by the evidence mapper and reports.
pub mod nodes {
    pub const ROAD_PASSIBILITY: &str = "roadPassibility";
    pub const ROAD_LOSS: &str = "roadLoss";
    pub const EMERGENCY_PERIOD: &str = "emergencyPeriod";
    pub const EMERGENCY_TYPE: &str = "emergencyType";
    pub const CASUALTIES: &str = "casualties";
    pub const RESPONSE_DURATION: &str = "responseDuration";
    pub const DISPOSAL_DURATION: &str = "disposalDuration";
    pub const RESCUE_RESOURCE: &str = "RescueResource";
    pub const FIREFIGHTING_RESOURCE: &str = "FirefightingResource";
    pub const TOW_RESOURCE: &str = "TowResource";
    pub const AID_RESOURCE: &str = "AidResource";

    pub const ABSORPTION_CAPACITY: &str = "AbsorptionCapacity";
    pub const ADAPTION_CAPACITY: &str = "AdaptionCapacity";
    pub const RECOVERY_CAPACITY: &str = "RecoveryCapacity";
    pub const SCENARIO_RESILIENCE: &str = "ScenarioResilience";

    pub const RESOURCES: [&str; 4] = [
        AID_RESOURCE,
        TOW_RESOURCE,
        FIREFIGHTING_RESOURCE,
        RESCUE_RESOURCE,
    ];

    pub const CAPACITIES: [&str; 3] = [ABSORPTION_CAPACITY, ADAPTION_CAPACITY, RECOVERY_CAPACITY];
}

/// Network definition of the scenario resilience model.
pub const SCENARIO_RESILIENCE_SOURCE: &str = r#"
// Road emergency scenario resilience
network ScenarioResilience {
    node roadPassibility { Impassable, Passable } prior categorical;
    node roadLoss { Not_Loss, Loss } prior categorical;
    node emergencyPeriod { Early_Morning, Morning, Afternoon, Evening } prior categorical;
    node emergencyType {
        Vehicle_Self_Accident,
        Vehicle_to_Fixed_Object_Accident,
        Collision_Accident
    } prior categorical;
    node casualties { No_Casualties, Casualties } prior categorical;
    node responseDuration { "0-15min", "15-30min", "30-60min", "60min+" } prior duration [0, 15, 30, 60];
    node disposalDuration { "0-15min", "15-30min", "30-60min", "60min+" } prior duration [0, 15, 30, 60];
    node RescueResource { Not_Used, Used } prior categorical;
    node FirefightingResource { Not_Used, Used } prior categorical;
    node TowResource { Not_Used, Used } prior categorical;
    node AidResource { Not_Used, Used } prior categorical;

    node AbsorptionCapacity { Good, Bad } given (roadPassibility, roadLoss);
    node AdaptionCapacity { Good, Bad } given (emergencyPeriod, emergencyType, casualties);
    node RecoveryCapacity { Good, Bad } given (
        disposalDuration,
        responseDuration,
        RescueResource,
        FirefightingResource,
        TowResource,
        AidResource
    );

    node ScenarioResilience { Good, Bad } given (RecoveryCapacity, AdaptionCapacity, AbsorptionCapacity);
}
"#;

/// Parses the scenario network definition.
pub fn scenario_spec() -> Result<crate::NetworkSpec, crate::ResilienceError> {
    crate::load_network_spec(SCENARIO_RESILIENCE_SOURCE)
}
