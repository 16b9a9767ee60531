/// One station collection together with the area collection aggregated from
/// it and the queue announcing which areas changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationSet {
    pub station_table: &'static str,
    pub area_table: &'static str,
    pub queue: &'static str,
}

impl StationSet {
    /// Stations built from our own observations.
    pub const CELL: StationSet = StationSet {
        station_table: "cell",
        area_table: "cell_area",
        queue: "update_cellarea",
    };

    /// Stations imported from OpenCellID.
    pub const OCID: StationSet = StationSet {
        station_table: "cell_ocid",
        area_table: "cell_area_ocid",
        queue: "update_cellarea_ocid",
    };
}
