//! Minimal XML reference reader: turns `<LinearSegment>` elements into
//! `LinearSegment` records, the only thing that crosses the core boundary.

use crate::core::errors::{DecoderError, Result};
use crate::core::types::{
    FormOfAWay, FunctionalRoadClass, LatLon, LinearLocationReference, LinearSegment,
    LocationReferencePoint,
};
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

pub fn parse_segments(xml_data: &str) -> Result<Vec<LinearSegment>> {
    let parser = EventReader::new(xml_data.as_bytes());
    let mut segments = Vec::new();

    let mut segment_id: Option<u32> = None;
    let mut segment_length: u32 = 0;
    let mut positive_offset: u32 = 0;
    let mut negative_offset: u32 = 0;
    let mut points: Vec<LocationReferencePoint> = Vec::new();

    for event in parser.into_iter() {
        match event {
            Ok(XmlEvent::StartElement {
                name, attributes, ..
            }) => match name.local_name.as_str() {
                "LinearSegment" => {
                    segment_id = Some(parse_attribute::<u32>(&attributes, "segmentId", "LinearSegment")?);
                    segment_length =
                        parse_attribute::<u32>(&attributes, "segmentLengthMeters", "LinearSegment")?;
                    positive_offset =
                        optional_attribute::<u32>(&attributes, "positiveOffsetMeters").unwrap_or(0);
                    negative_offset =
                        optional_attribute::<u32>(&attributes, "negativeOffsetMeters").unwrap_or(0);
                    points = Vec::new();
                }
                "LocationReferencePoint" => {
                    let lat = parse_attribute::<f64>(&attributes, "lat", "LocationReferencePoint")?;
                    let lon = parse_attribute::<f64>(&attributes, "lon", "LocationReferencePoint")?;
                    let bearing = parse_attribute::<u8>(&attributes, "bearing", "LocationReferencePoint")?;
                    let frc = parse_frc(&get_attribute(&attributes, "frc").unwrap_or_default())?;
                    let fow = parse_fow(&get_attribute(&attributes, "fow").unwrap_or_default())?;
                    let dnp = optional_attribute::<u32>(&attributes, "dnp").unwrap_or(0);
                    let lfrcnp = match get_attribute(&attributes, "lfrcnp") {
                        Some(s) => parse_frc(&s)?,
                        None => FunctionalRoadClass::NotAValue,
                    };
                    points.push(LocationReferencePoint {
                        lat_lon: LatLon::new(lat, lon),
                        bearing,
                        functional_road_class: frc,
                        form_of_a_way: fow,
                        distance_to_next_point_meters: dnp,
                        lowest_frc_to_next_point: lfrcnp,
                    });
                }
                _ => {}
            },
            Ok(XmlEvent::EndElement { name }) if name.local_name == "LinearSegment" => {
                let id = segment_id.take().ok_or_else(|| {
                    DecoderError::InvalidReference("LinearSegment missing segmentId".to_string())
                })?;
                if points.len() < 2 {
                    return Err(DecoderError::InvalidReference(format!(
                        "segment {id} has fewer than 2 reference points"
                    )));
                }
                segments.push(LinearSegment {
                    segment_id: id,
                    location_reference: LinearLocationReference {
                        points: std::mem::take(&mut points),
                        positive_offset_meters: positive_offset,
                        negative_offset_meters: negative_offset,
                    },
                    segment_length_meters: segment_length,
                });
            }
            Err(e) => return Err(DecoderError::XmlParsing(e)),
            _ => {}
        }
    }

    Ok(segments)
}

fn parse_frc(s: &str) -> Result<FunctionalRoadClass> {
    Ok(match s {
        "FRC0" => FunctionalRoadClass::Frc0,
        "FRC1" => FunctionalRoadClass::Frc1,
        "FRC2" => FunctionalRoadClass::Frc2,
        "FRC3" => FunctionalRoadClass::Frc3,
        "FRC4" => FunctionalRoadClass::Frc4,
        "FRC5" => FunctionalRoadClass::Frc5,
        "FRC6" => FunctionalRoadClass::Frc6,
        "FRC7" => FunctionalRoadClass::Frc7,
        "" | "NotAValue" => FunctionalRoadClass::NotAValue,
        other => {
            return Err(DecoderError::InvalidReference(format!(
                "unrecognized FRC value: {other}"
            )))
        }
    })
}

fn parse_fow(s: &str) -> Result<FormOfAWay> {
    Ok(match s {
        "Motorway" => FormOfAWay::Motorway,
        "MultipleCarriageway" => FormOfAWay::MultipleCarriageway,
        "SingleCarriageway" => FormOfAWay::SingleCarriageway,
        "Roundabout" => FormOfAWay::Roundabout,
        "TrafficSquare" => FormOfAWay::TrafficSquare,
        "SlipRoad" => FormOfAWay::SlipRoad,
        "Other" => FormOfAWay::Other,
        "" | "NotAValue" => FormOfAWay::NotAValue,
        "Undefined" => FormOfAWay::Undefined,
        other => {
            return Err(DecoderError::InvalidReference(format!(
                "unrecognized FOW value: {other}"
            )))
        }
    })
}

fn parse_attribute<T: std::str::FromStr>(
    attributes: &[OwnedAttribute],
    name: &str,
    element: &str,
) -> Result<T> {
    get_attribute(attributes, name)
        .and_then(|v| v.parse::<T>().ok())
        .ok_or_else(|| {
            DecoderError::InvalidReference(format!("attribute '{name}' missing or invalid on {element}"))
        })
}

fn optional_attribute<T: std::str::FromStr>(attributes: &[OwnedAttribute], name: &str) -> Option<T> {
    get_attribute(attributes, name).and_then(|v| v.parse::<T>().ok())
}

fn get_attribute(attributes: &[OwnedAttribute], name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|attr| attr.name.local_name == name)
        .map(|attr| attr.value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_two_point_segment() {
        let xml = r#"<LinearSegments>
            <LinearSegment segmentId="42" segmentLengthMeters="100">
                <LocationReferencePoint lat="50.0" lon="13.0" bearing="64" frc="FRC2" fow="SingleCarriageway" dnp="100" lfrcnp="FRC2"/>
                <LocationReferencePoint lat="50.0" lon="13.0014" bearing="64" frc="FRC2" fow="SingleCarriageway"/>
            </LinearSegment>
        </LinearSegments>"#;

        let segments = parse_segments(xml).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].segment_id, 42);
        assert_eq!(segments[0].location_reference.points.len(), 2);
        assert!(!segments[0].location_reference.is_multipoint());
    }

    #[test]
    fn rejects_a_single_point_segment() {
        let xml = r#"<LinearSegments>
            <LinearSegment segmentId="1" segmentLengthMeters="0">
                <LocationReferencePoint lat="50.0" lon="13.0" bearing="0" frc="FRC2" fow="SingleCarriageway"/>
            </LinearSegment>
        </LinearSegments>"#;

        assert!(parse_segments(xml).is_err());
    }

    #[test]
    fn parses_unknown_frc_as_error() {
        let xml = r#"<LinearSegments>
            <LinearSegment segmentId="1" segmentLengthMeters="0">
                <LocationReferencePoint lat="50.0" lon="13.0" bearing="0" frc="BOGUS" fow="SingleCarriageway"/>
                <LocationReferencePoint lat="50.0" lon="13.0" bearing="0" frc="FRC2" fow="SingleCarriageway"/>
            </LinearSegment>
        </LinearSegments>"#;

        assert!(parse_segments(xml).is_err());
    }
}
