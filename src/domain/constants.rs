//! Stable names shared by the stores, the artifact renderer and the deployment driver.

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cb_bdti.toml";
pub const RECORDS_FILE_NAME: &str = "integrated.toml";
pub const DEFAULT_ARTIFACTS_DIR: &str = "/var/tmp";
pub const AGENT_FILE_NAME: &str = "agent.conf";
pub const GROUPING_RULES_FILE_NAME: &str = "grouping_rules.conf";

// Reserved sections of the desired configuration.
pub const BROKER_SECTION: &str = "fiware";
pub const STORAGE_SECTION: &str = "hdfs";
pub const RESERVED_SECTIONS: [&str; 2] = [BROKER_SECTION, STORAGE_SECTION];

pub const ORION_HOST: &str = "orion_host";
pub const CYGNUS_HOST: &str = "cygnus_host";
pub const CYGNUS_KEY_PATH: &str = "cygnus_ssh_key_path";
pub const CYGNUS_USERNAME: &str = "cygnus_ssh_username";

pub const HDFS_HOST: &str = "host";
pub const HDFS_PORT: &str = "port";
pub const HDFS_USERNAME: &str = "username";
pub const HDFS_FORMAT_FILE: &str = "format_file";
pub const HDFS_OAUTH2_TOKEN: &str = "oauth2_token";
pub const HDFS_KRB5_AUTH: &str = "krb5_auth";
pub const HDFS_KRB5_USER: &str = "krb5_user";
pub const HDFS_KRB5_PASSWORD: &str = "krb5_password";

pub const DATA_MODEL_TYPES: &str = "types";
pub const DATA_MODEL_SERVICE: &str = "fiware_service";
pub const DATA_MODEL_SERVICE_PATH: &str = "fiware_servicepath";
pub const DATA_MODEL_THROTTLING: &str = "throttling";
pub const DATA_MODEL_EXPIRES: &str = "expires";
pub const DATA_MODEL_FILE_PATH: &str = "file_path";
pub const DATA_MODEL_FILE_NAME: &str = "file_name";

/// Storage setting name -> key in the Cygnus agent file, in render order.
pub const AGENT_CONF_KEYS: [(&str, &str); 8] = [
    (HDFS_HOST, "cygnus-ngsi.sinks.hdfs-sink.hdfs_host"),
    (HDFS_PORT, "cygnus-ngsi.sinks.hdfs-sink.hdfs_port"),
    (HDFS_USERNAME, "cygnus-ngsi.sinks.hdfs-sink.hdfs_username"),
    (HDFS_FORMAT_FILE, "cygnus-ngsi.sinks.hdfs-sink.file_format"),
    (HDFS_OAUTH2_TOKEN, "cygnus-ngsi.sinks.hdfs-sink.oauth2_token"),
    (HDFS_KRB5_AUTH, "cygnus-ngsi.sinks.hdfs-sink.krb5_auth"),
    (HDFS_KRB5_USER, "cygnus-ngsi.sinks.hdfs-sink.krb5_user"),
    (HDFS_KRB5_PASSWORD, "cygnus-ngsi.sinks.hdfs-sink.krb5_password"),
];

pub const BROKER_PORT: u16 = 1026;
pub const BROKER_SUBSCRIPTIONS_PATH: &str = "ngsi-ld/v1/subscriptions";
pub const NOTIFICATION_PORT: u16 = 5050;
pub const NOTIFICATION_PATH: &str = "/notify";

pub const AGENT_IMAGE_NAME: &str = "fiware/cygnus-ngsi";
pub const AGENT_CONTAINER_NAME: &str = "cygnus";
pub const AGENT_CONF_MOUNT: &str = "/opt/apache-flume/conf/agent.conf";
pub const GROUPING_RULES_MOUNT: &str = "/opt/apache-flume/conf/grouping_rules.conf";

/// Entity types accepted for each FIWARE data model family.
pub const FIWARE_DATAMODELS: &[(&str, &[&str])] = &[
    ("Alert", &["Alert"]),
    (
        "CivicIssueTracking",
        &["Open311:ServiceType", "Open311:ServiceRequest"],
    ),
    ("Device", &["Device", "DeviceModel"]),
    (
        "Environment",
        &[
            "AeroAllergenObserved",
            "AirQualityObserved",
            "WaterQualityObserved",
            "NoiseLevelObserved",
        ],
    ),
    ("Indicators", &["KeyPerformanceIndicator"]),
    (
        "Parking",
        &[
            "OffStreetParking",
            "OnStreetParking",
            "ParkingGroup",
            "ParkingAccess",
            "ParkingSpot",
        ],
    ),
    (
        "ParksAndGardens",
        &["Garden", "GreenspaceRecord", "FlowerBed"],
    ),
    (
        "PointsOfInterest",
        &["PointOfInterest", "Beach", "Museum"],
    ),
    (
        "StreetLightning",
        &[
            "Streetlight",
            "StreetlightModel",
            "StreetlightGroup",
            "StreetlightControlCabinet",
        ],
    ),
    (
        "Transportation",
        &[
            "BikeHireDockingStation",
            "Road",
            "RoadSegment",
            "TrafficFlowObserved",
            "Vehicle",
            "VehicleModel",
            "EVChargingStation",
        ],
    ),
    (
        "Weather",
        &["WeatherObserved", "WeatherForecast", "WeatherAlert"],
    ),
    (
        "WasteManagement",
        &["WasteContainerIsle", "WasteContainerModel", "WasteContainer"],
    ),
    (
        "Agrifood",
        &[
            "AgriApp",
            "AgriCrop",
            "AgriFarm",
            "AgriGreenhouse",
            "AgriParcel",
            "AgriParcelOperation",
            "AgriParcelRecord",
            "AgriPest",
        ],
    ),
    ("Building", &["Building", "BuildingOperation"]),
    ("Energy", &["ThreePhaseAcMeasurement"]),
    (
        "PointsOfInteraction",
        &["SmartPointOfInteraction", "SmartSpot"],
    ),
    (
        "UrbanMobility",
        &[
            "GtfsAgency",
            "GtfsStop",
            "GtfsStation",
            "GtfsAccessPoint",
            "GtfsRoute",
            "GtfsTrip",
            "GtfsStopTime",
            "GtfsService",
            "GtfsCalendarRule",
            "GtfsCalendarDateRule",
            "GtfsFrequency",
            "GtfsTransferRule",
            "GtfsShape",
            "ArrivalEstimation",
        ],
    ),
];
