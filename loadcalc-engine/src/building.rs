//! 建筑级汇总：两个单元的合并计算，以及三个及以上单元的建筑总表。

use loadcalc_core::load::{BuildingInformation, UnitInformation};

use crate::demand::{service_amps, LoadSheet, ServiceRatingTable, Totals};
use crate::errors::ValidationError;
use crate::report::{
    service_section, HEADING_MARKER, Report, ReportRow, ReportSection, SectionKind,
};

/// 建筑按单元总数决定输出的报表类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingPlan {
    /// 少于两个单元，不单独出表。
    None,
    /// 恰好两个单元，合并成一份单元报表。
    Combo,
    /// 三个及以上单元，输出建筑汇总报表。
    Aggregate,
}

pub fn plan_for(building: &BuildingInformation) -> BuildingPlan {
    match building.total_number_of_units() {
        0 | 1 => BuildingPlan::None,
        2 => BuildingPlan::Combo,
        _ => BuildingPlan::Aggregate,
    }
}

fn find_unit<'a>(
    building: &BuildingInformation,
    units: &'a [UnitInformation],
    unit_id: u32,
) -> Result<&'a UnitInformation, ValidationError> {
    units
        .iter()
        .find(|unit| unit.id == unit_id)
        .ok_or_else(|| ValidationError::UnknownUnit {
            building: building.name.clone(),
            unit_id,
        })
}

/// 检查建筑引用的单元都存在。
pub fn validate_building(
    building: &BuildingInformation,
    units: &[UnitInformation],
) -> Result<(), ValidationError> {
    for counter in &building.counters {
        find_unit(building, units, counter.unit_id)?;
    }
    Ok(())
}

/// 两单元建筑的合并对象：一个数量为 2 的计数器与自身合并，或两个数量为 1 的单元按 ID 排序。
pub fn combo_pair<'a>(
    building: &BuildingInformation,
    units: &'a [UnitInformation],
) -> Result<Option<(&'a UnitInformation, &'a UnitInformation)>, ValidationError> {
    if plan_for(building) != BuildingPlan::Combo {
        return Ok(None);
    }
    let mut active: Vec<_> = building
        .counters
        .iter()
        .filter(|counter| counter.count > 0)
        .collect();
    active.sort_by_key(|counter| counter.unit_id);
    match active.as_slice() {
        [only] if only.count == 2 => {
            let unit = find_unit(building, units, only.unit_id)?;
            Ok(Some((unit, unit)))
        }
        [first, second] => Ok(Some((
            find_unit(building, units, first.unit_id)?,
            find_unit(building, units, second.unit_id)?,
        ))),
        _ => Ok(None),
    }
}

/// 合并计算用的负荷清单。
pub fn combo_sheet(
    building: &BuildingInformation,
    units: &[UnitInformation],
) -> Result<Option<LoadSheet>, ValidationError> {
    match combo_pair(building, units)? {
        Some((first, second)) => LoadSheet::combine(first, second).map(Some),
        None => Ok(None),
    }
}

/// 建筑总表中的一行：单元、数量与其服务负荷。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingUnitRow {
    pub unit_name: String,
    pub count: u32,
    pub service_va: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingAggregate {
    pub building_id: u32,
    pub building_name: String,
    pub rows: Vec<BuildingUnitRow>,
    pub totals: Totals,
}

/// 按数量加权累加各单元的汇总值，不再施加需用系数。
pub fn aggregate(
    building: &BuildingInformation,
    units: &[UnitInformation],
    ratings: &ServiceRatingTable,
) -> Result<BuildingAggregate, ValidationError> {
    let mut rows = Vec::with_capacity(building.counters.len());
    let mut voltage: Option<(u32, String)> = None;
    let mut sums = [0i64; 7];
    for counter in &building.counters {
        let unit = find_unit(building, units, counter.unit_id)?;
        match &voltage {
            Some((expected, first)) if *expected != unit.voltage => {
                return Err(ValidationError::VoltageMismatch {
                    first: first.clone(),
                    second: unit.name.clone(),
                });
            }
            Some(_) => {}
            None => voltage = Some((unit.voltage, unit.name.clone())),
        }
        let unit_totals = LoadSheet::for_unit(unit)?.totals(ratings);
        let count = i64::from(counter.count);
        let parts = [
            unit_totals.total_general_load,
            unit_totals.amount_over_10kva,
            unit_totals.first_10kva,
            unit_totals.remainder_at_40_percent,
            unit_totals.subtotal_general_load,
            unit_totals.total_ac_load,
            unit_totals.custom_load,
        ];
        let too_large = || ValidationError::LoadTooLarge {
            unit: unit.name.clone(),
            load: format!("{} x{}", building.formatted_name(), counter.count),
        };
        for (sum, part) in sums.iter_mut().zip(parts) {
            *sum = count
                .checked_mul(part)
                .and_then(|weighted| sum.checked_add(weighted))
                .ok_or_else(too_large)?;
        }
        let service_va = count
            .checked_mul(unit_totals.service_va())
            .ok_or_else(too_large)?;
        rows.push(BuildingUnitRow {
            unit_name: unit.name.clone(),
            count: counter.count,
            service_va,
        });
    }
    let voltage = voltage.map_or(UnitInformation::SUPPORTED_VOLTAGES[1], |(v, _)| v);
    let [total_general_load, amount_over_10kva, first_10kva, remainder_at_40_percent, subtotal_general_load, total_ac_load, custom_load] =
        sums;
    let service_va = subtotal_general_load
        .checked_add(total_ac_load)
        .and_then(|va| va.checked_add(custom_load))
        .ok_or_else(|| ValidationError::LoadTooLarge {
            unit: building.name.clone(),
            load: building.formatted_name(),
        })?;
    let service_load = service_amps(service_va, voltage);
    Ok(BuildingAggregate {
        building_id: building.id,
        building_name: building.name.clone(),
        rows,
        totals: Totals {
            total_general_load,
            amount_over_10kva,
            first_10kva,
            remainder_at_40_percent,
            subtotal_general_load,
            total_ac_load,
            custom_load,
            voltage,
            service_load,
            service_rating: ratings.rating_for(service_load),
        },
    })
}

pub fn building_container_name(building: &BuildingInformation) -> String {
    format!("Building {} ID{}", building.name, building.id)
}

/// 建筑汇总报表：单元列表、合计与服务额定值。
pub fn building_report(aggregate: &BuildingAggregate) -> Report {
    let totals = &aggregate.totals;
    Report {
        container_name: format!(
            "Building {} ID{}",
            aggregate.building_name, aggregate.building_id
        ),
        heading: format!("{HEADING_MARKER} - BUILDING {}", aggregate.building_name),
        sections: vec![
            ReportSection {
                kind: SectionKind::BuildingUnits,
                title: Some("Building Units:".to_string()),
                rows: aggregate
                    .rows
                    .iter()
                    .map(|row| {
                        ReportRow::va(format!("Unit {} ({}):", row.unit_name, row.count), row.service_va)
                    })
                    .collect(),
            },
            ReportSection {
                kind: SectionKind::BuildingCalculation,
                title: None,
                rows: vec![
                    ReportRow::va("Total General Calculated Load:", totals.subtotal_general_load),
                    ReportRow::va("Total AC Load:", totals.total_ac_load),
                    ReportRow::va("Total Additional Load:", totals.custom_load),
                ],
            },
            service_section(totals),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadcalc_core::load::{GeneralLoadSlot, UnitLoad};

    fn unit(id: u32, name: &str, lighting: i64) -> UnitInformation {
        let mut unit = UnitInformation::new(id, name);
        for slot in GeneralLoadSlot::ALL {
            unit.general_loads.slot_mut(slot).va = 0;
        }
        unit.general_loads.lighting.va = lighting;
        unit
    }

    #[test]
    fn plan_depends_on_total_units() {
        let mut building = BuildingInformation::new(1, "North");
        assert_eq!(plan_for(&building), BuildingPlan::None);
        building.set_count(1, 1);
        assert_eq!(plan_for(&building), BuildingPlan::None);
        building.set_count(2, 1);
        assert_eq!(plan_for(&building), BuildingPlan::Combo);
        building.set_count(2, 2);
        assert_eq!(plan_for(&building), BuildingPlan::Aggregate);
    }

    #[test]
    fn combo_pairs_order_by_id_or_duplicate_single_unit() {
        let units = vec![unit(1, "A", 0), unit(2, "B", 0), unit(5, "C", 0)];
        let mut building = BuildingInformation::new(1, "North");
        building.set_count(5, 1);
        building.set_count(2, 1);
        let (first, second) = combo_pair(&building, &units)
            .expect("单元存在")
            .expect("两单元建筑");
        assert_eq!((first.id, second.id), (2, 5));

        let mut twin = BuildingInformation::new(2, "Twin");
        twin.set_count(5, 2);
        let (first, second) = combo_pair(&twin, &units).expect("单元存在").expect("自合并");
        assert_eq!((first.id, second.id), (5, 5));

        let sheet = combo_sheet(&twin, &units).expect("可以合并").expect("存在合并");
        assert_eq!(sheet.unit_names, vec!["C".to_string(), "C".to_string()]);
    }

    #[test]
    fn unknown_units_fail_validation() {
        let units = vec![unit(1, "A", 0)];
        let mut building = BuildingInformation::new(1, "North");
        building.set_count(1, 1);
        building.set_count(9, 1);
        assert!(matches!(
            validate_building(&building, &units),
            Err(ValidationError::UnknownUnit { unit_id: 9, .. })
        ));
        assert!(combo_pair(&building, &units).is_err());
    }

    #[test]
    fn aggregate_weights_unit_totals_by_count() {
        let mut a = unit(1, "A", 12_000);
        a.ac_loads.condenser = 3_000;
        let mut b = unit(2, "B", 6_000);
        b.custom_loads.push(UnitLoad::new("Spa", 1_000, 1));
        let units = vec![a, b];

        let mut building = BuildingInformation::new(4, "South");
        building.set_count(1, 2);
        building.set_count(2, 1);
        let result = aggregate(&building, &units, &ServiceRatingTable::default()).expect("汇总");

        // A: 10800 + 3000；B: 6000 + 1000
        assert_eq!(result.rows[0], BuildingUnitRow { unit_name: "A".into(), count: 2, service_va: 27_600 });
        assert_eq!(result.rows[1].service_va, 7_000);
        assert_eq!(result.totals.subtotal_general_load, 27_600);
        assert_eq!(result.totals.total_general_load, 30_000);
        assert_eq!(result.totals.total_ac_load, 6_000);
        assert_eq!(result.totals.custom_load, 1_000);
        assert!((result.totals.service_load - 34_600.0 / 240.0).abs() < 1e-9);
        assert_eq!(result.totals.service_rating, 150);

        let report = building_report(&result);
        assert_eq!(report.container_name, "Building South ID4");
        assert_eq!(building_container_name(&building), report.container_name);
        assert_eq!(report.heading, "SERVICE LOAD CALCULATION - BUILDING South");
        assert_eq!(report.row_counts(), vec![3, 3, 4]);
        let units_section = report.section(SectionKind::BuildingUnits).expect("单元节");
        assert_eq!(units_section.rows[0], ReportRow::new("Unit A (2):", "27600VA"));
    }

    #[test]
    fn aggregate_rejects_weighted_sums_that_overflow() {
        let units: Vec<UnitInformation> = (1..=3)
            .map(|id| {
                let mut unit = unit(id, "Big", 0);
                unit.ac_loads.condenser = 1_000_000_000;
                unit
            })
            .collect();
        let mut building = BuildingInformation::new(7, "Tower");
        for id in 1..=3 {
            building.set_count(id, u32::MAX);
        }
        assert_eq!(building.total_number_of_units(), u32::MAX);
        assert!(matches!(
            aggregate(&building, &units, &ServiceRatingTable::default()),
            Err(ValidationError::LoadTooLarge { .. })
        ));
    }

    #[test]
    fn aggregate_rejects_mixed_voltage() {
        let a = unit(1, "A", 0);
        let mut b = unit(2, "B", 0);
        b.voltage = 208;
        let mut building = BuildingInformation::new(1, "Mixed");
        building.set_count(1, 2);
        building.set_count(2, 1);
        assert!(matches!(
            aggregate(&building, &[a, b], &ServiceRatingTable::default()),
            Err(ValidationError::VoltageMismatch { .. })
        ));
    }
}
