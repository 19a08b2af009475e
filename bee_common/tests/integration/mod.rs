mod well_geometry;
mod well_journal;
