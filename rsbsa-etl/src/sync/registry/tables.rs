//! Table definitions for the aggregation hub

use std::borrow::Cow;

use super::{col, Cardinality, Cascade, Column, Resolution, TableSpec};

const RSBSA_INDEX: &[&str] = &["rsbsa_no"];
const RSBSA_AND_PARCEL_INDEX: &[&str] = &["rsbsa_no", "parcel_id"];

const ENCODER_FIELDS: &[&str] = &["encoder_fullname"];

const PARCEL_FIELDS: &[&str] = &[
    "owner_firstname",
    "owner_lastname",
    "owner_extname",
    "farmers_rotation_fullname",
    "desc_location",
    "unit_measure",
    "own_doc_no",
    "attachment",
];

const FARMERS_KYC1: &[Column] = &[
    col("kyc1_id", "INT(11)"),
    col("farmerID", "VARCHAR(50)"),
    col("philsys_trn", "VARCHAR(50)"),
    col("philsys_pcn", "VARCHAR(50)"),
    col("sequence", "INT(11)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("source_rsbsa_no", "VARCHAR(50)"),
    col("data_source", "ENUM('FFRS', 'NFFIS', 'NCFRSS', 'NIA', 'FISHR')"),
    col("other_sys_gen_id", "VARCHAR(100)"),
    col("other_sys_id", "VARCHAR(100)"),
    col("enrollment", "VARCHAR(1)"),
    col("file_picture", "VARCHAR(100)"),
    col("control_no", "VARCHAR(50)"),
    col("first_name", "VARCHAR(120)"),
    col("middle_name", "VARCHAR(100)"),
    col("surname", "VARCHAR(100)"),
    col("ext_name", "VARCHAR(50)"),
    col("mother_maiden_name", "VARCHAR(220)"),
    col("spouse_rsbsa_no", "VARCHAR(50)"),
    col("maiden_fname", "VARCHAR(50)"),
    col("maiden_mname", "VARCHAR(50)"),
    col("maiden_lname", "VARCHAR(50)"),
    col("maiden_extname", "VARCHAR(50)"),
    col("sex", "TINYINT(1)"),
    col("birthday", "DATE"),
    col("birth_place", "VARCHAR(50)"),
    col("birth_prv", "VARCHAR(200)"),
    col("birth_prv_mun", "VARCHAR(100)"),
    col("house_no", "VARCHAR(255)"),
    col("street", "VARCHAR(255)"),
    col("brgy1", "TINYINT(3) UNSIGNED ZEROFILL"),
    col("mun1", "TINYINT(2) UNSIGNED ZEROFILL"),
    col("prv1", "TINYINT(2) UNSIGNED ZEROFILL"),
    col("reg1", "TINYINT(2) UNSIGNED ZEROFILL"),
    col("geo_code", "VARCHAR(9)"),
    col("geocode", "VARCHAR(15)"),
    col("brgy", "INT(3) UNSIGNED ZEROFILL"),
    col("mun", "INT(2) UNSIGNED ZEROFILL"),
    col("prv", "INT(3) UNSIGNED ZEROFILL"),
    col("reg", "INT(2) UNSIGNED ZEROFILL"),
    col("ncr_brgy", "INT(3) UNSIGNED ZEROFILL"),
    col("ncr_mun", "INT(2) UNSIGNED ZEROFILL"),
    col("ncr_prv", "INT(3) UNSIGNED ZEROFILL"),
    col("ncr_reg", "INT(2) UNSIGNED ZEROFILL"),
    col("ncr_house_no", "VARCHAR(255)"),
    col("ncr_street", "VARCHAR(255)"),
    col("c_date", "DATETIME"),
    col("clone_by_id", "VARCHAR(50)"),
    col("clone_by_fullname", "VARCHAR(120)"),
    col("date_cloned", "TIMESTAMP NULL"),
    col("v1_v2", "TINYINT(1)"),
];

const FARMERS_KYC2: &[Column] = &[
    col("kyc2_id", "INT(11)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("contact_num", "VARCHAR(20)"),
    col("contact_num_question", "TINYINT(1)"),
    col("mob_number_fname", "VARCHAR(50)"),
    col("mob_number_mname", "VARCHAR(50)"),
    col("mob_number_lname", "VARCHAR(50)"),
    col("mob_number_extname", "VARCHAR(50)"),
    col("landline_num", "VARCHAR(20)"),
    col("education", "TINYINT(1)"),
    col("pwd", "TINYINT(1)"),
    col("religion", "VARCHAR(50)"),
    col("civil_status", "TINYINT(1)"),
    col("spouse", "VARCHAR(220)"),
    col("spouse_fname", "VARCHAR(50)"),
    col("spouse_mname", "VARCHAR(50)"),
    col("spouse_lname", "VARCHAR(50)"),
    col("spouse_extname", "VARCHAR(50)"),
    col("spouse_rsbsa_no", "VARCHAR(50)"),
    col("beneficiary_4ps", "TINYINT(1)"),
    col("ind_ans", "TINYINT(1)"),
    col("ind_id", "VARCHAR(50)"),
    col("gov_ans", "TINYINT(1)"),
    col("gov_id", "VARCHAR(50)"),
    col("gov_id_num", "VARCHAR(50)"),
    col("hh_head", "TINYINT(1)"),
    col("hh_head_name", "VARCHAR(255)"),
    col("hh_relationship", "VARCHAR(50)"),
    col("hh_no_members", "INT(11)"),
    col("hh_no_male", "INT(11)"),
    col("hh_no_female", "INT(11)"),
    col("fca_ans", "TINYINT(1)"),
    col("fca_id", "VARCHAR(50)"),
    col("emergency_name", "VARCHAR(220)"),
    col("emergency_contact", "VARCHAR(50)"),
];

const FARMERS_KYC3: &[Column] = &[
    col("kyc3_id", "INT(11)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("no_farm_parcels", "INT(11)"),
    col("arb", "TINYINT(1)"),
    col("gross_income_farming", "DECIMAL(10,2)"),
    col("gross_income_nonfarming", "DECIMAL(10,2)"),
    col("vtc_date", "DATE"),
    col("vtc_bgy_chair", "VARCHAR(255)"),
    col("vtc_agri_office", "VARCHAR(150)"),
    col("vtc_mafc_chair", "VARCHAR(255)"),
];

const FARMERS_KYC4: &[Column] = &[
    col("kyc4_id", "INT(11)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("encoder_agency", "VARCHAR(50)"),
    col("encoder_id", "VARCHAR(50)"),
    col("encoder_fullname", "VARCHAR(120)"),
    col("encoder_id_updated", "VARCHAR(50)"),
    col("encoder_fullname_updated", "VARCHAR(120)"),
    col("date_created", "TIMESTAMP NULL"),
    col("date_updated", "TIMESTAMP NULL"),
    col("deceased", "ENUM('1','0')"),
    col("deceased_reason", "TINYTEXT"),
    col("ch_occupation", "ENUM('active','inactive')"),
    col("ch_occupation_reason", "TINYTEXT"),
    col("duplicated", "ENUM('1','0')"),
    col("duplicated_reason", "TINYTEXT"),
    col("duplicated_rsbsa_no", "TINYTEXT"),
    col("rffa2_cashout", "TINYINT(4)"),
    col("validated", "ENUM('1','0','2')"),
    col("unvalidated_reason", "TINYTEXT"),
    col("validator_by_id", "VARCHAR(100)"),
    col("validator_fullname", "VARCHAR(100)"),
    col("date_validated", "DATETIME"),
    col("submitted", "ENUM('1','0')"),
    col("date_submitted", "DATETIME"),
    col("submitted_by_id", "VARCHAR(100)"),
    col("submitted_by_fullname", "VARCHAR(100)"),
    col("rfo_validated", "ENUM('1','0')"),
    col("rfo_date_validated", "DATETIME"),
    col("rfo_validated_id", "VARCHAR(100)"),
    col("rfo_validated_fullname", "VARCHAR(100)"),
    col("online_applicant", "ENUM('1','0')"),
    col("checked_date", "DATETIME"),
    col("checked", "ENUM('1','0')"),
    col("checked_by_id", "VARCHAR(50)"),
    col("checked_fullname", "VARCHAR(100)"),
    col("complete_cloned_by_fullname", "VARCHAR(120)"),
    col("complete_cloned_by_id", "VARCHAR(50)"),
    col("date_cloned_completed", "TIMESTAMP NULL"),
    col("rsbsa_liveness_verified", "INT(1)"),
    col("rsbsa_last_liveness_date", "DATETIME"),
    col("rsbsa_last_user_id_liveness", "VARCHAR(50)"),
    col("rsbsa_last_user_fullname_liveness", "VARCHAR(100)"),
    col("philsys_liveness_verified", "INT(1)"),
    col("philsys_last_liveness_date", "DATETIME"),
    col("philsys_last_user_id_liveness", "VARCHAR(50)"),
    col("philsys_last_user_fullname_liveness", "VARCHAR(100)"),
];

const FARMERS_ATTACHMENTS: &[Column] = &[
    col("fatt_id", "INT(11)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("filename", "VARCHAR(200)"),
    col("validity_file", "ENUM('1','0','2')"),
    col("date_created", "TIMESTAMP NULL"),
    col("active", "ENUM('1','0')"),
    col("encoder_agency", "VARCHAR(50)"),
    col("encoder_id", "VARCHAR(50)"),
    col("encoder_fullname", "VARCHAR(255)"),
];

const FARMERS_FCA: &[Column] = &[
    col("id", "INT(11)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("fca_id", "VARCHAR(50)"),
    col("fca_name", "VARCHAR(255)"),
    col("date_created", "TIMESTAMP NULL"),
    col("active", "ENUM('1','0')"),
    col("encoder_agency", "VARCHAR(50)"),
    col("encoder_id", "VARCHAR(50)"),
    col("encoder_fullname", "VARCHAR(255)"),
];

const FARMERS_FORM_ATTACHMENTS: &[Column] = &[
    col("ffatt_id", "INT(11)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("filename", "VARCHAR(200)"),
    col("date_created", "TIMESTAMP NULL"),
    col("active", "ENUM('1','0')"),
    col("encoder_agency", "VARCHAR(50)"),
    col("encoder_id", "VARCHAR(50)"),
    col("encoder_fullname", "VARCHAR(255)"),
];

const FARMERS_LIVELIHOOD: &[Column] = &[
    col("farmlivelihoodID", "INT(11)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("livelihood", "VARCHAR(100)"),
    col("activity_work", "VARCHAR(150)"),
    col("specify", "VARCHAR(255)"),
    col("active", "ENUM('1','0')"),
];

const FARMPARCELACTIVITY: &[Column] = &[
    col("farmlanddetailsID", "INT(11)"),
    col("parcel_id", "VARCHAR(50)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("crop_id", "INT(11)"),
    col("size", "DECIMAL(10,4)"),
    col("temp_size", "DECIMAL(10,4)"),
    col("orig", "DECIMAL(10,4)"),
    col("no_heads", "INT(11)"),
    col("farm_type", "TINYINT(1)"),
    col("organic", "TINYINT(1)"),
    col("active", "ENUM('1','0')"),
    col("encoder_agency", "VARCHAR(50)"),
    col("encoder_id", "VARCHAR(50)"),
    col("encoder_fullname", "VARCHAR(255)"),
    col("date_created", "TIMESTAMP NULL"),
    col("slip_b_update", "TINYINT(4)"),
    col("from_slip_b_update", "TINYINT(4)"),
    col("intercrop", "ENUM('1','2')"),
    col("crop_date_start", "TINYINT(2)"),
    col("crop_date_end", "TINYINT(2)"),
    col("gpx_id", "VARCHAR(50)"),
];

const FARMPARCELATTACHMENTS: &[Column] = &[
    col("att_id", "INT(11)"),
    col("parcel_id", "VARCHAR(50)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("file_name", "VARCHAR(200)"),
    col("active", "ENUM('1','0')"),
    col("encoder_agency", "VARCHAR(50)"),
    col("encoder_id", "VARCHAR(50)"),
    col("encoder_fullname", "VARCHAR(200)"),
    col("date_created", "TIMESTAMP NULL"),
];

const FARMPARCEL: &[Column] = &[
    col("parcel_id", "VARCHAR(50)"),
    col("parcel_no", "TINYINT(2)"),
    col("arb", "TINYINT(2)"),
    col("ancestral", "TINYINT(2)"),
    col("bgy1", "TINYINT(3) UNSIGNED ZEROFILL"),
    col("mun1", "TINYINT(2) UNSIGNED ZEROFILL"),
    col("prv1", "TINYINT(2) UNSIGNED ZEROFILL"),
    col("reg1", "TINYINT(2) UNSIGNED ZEROFILL"),
    col("geo_code", "VARCHAR(9)"),
    col("bgy", "INT(3) UNSIGNED ZEROFILL"),
    col("mun", "INT(2) UNSIGNED ZEROFILL"),
    col("prv", "INT(3) UNSIGNED ZEROFILL"),
    col("reg", "INT(2) UNSIGNED ZEROFILL"),
    col("desc_location", "VARCHAR(200)"),
    col("parcel_geo_pol", "POLYGON"),
    col("parcel_geo_point", "POINT"),
    col("lat", "FLOAT(10,0)"),
    col("long", "FLOAT(10,0)"),
    col("farm_area", "DECIMAL(10,4) UNSIGNED"),
    col("temp_farm_area", "DECIMAL(10,4)"),
    col("unit_measure", "VARCHAR(20)"),
    col("own_doc", "TINYINT(2)"),
    col("own_doc_no", "VARCHAR(50)"),
    col("type", "TINYINT(1)"),
    col("owner_firstname", "VARCHAR(200)"),
    col("owner_lastname", "VARCHAR(200)"),
    col("owner_extname", "VARCHAR(200)"),
    col("owner_ans", "TINYINT(1)"),
    col("owner_rsbsa_no", "VARCHAR(50)"),
    col("farmers_rotation_fullname", "VARCHAR(200)"),
    col("farmers_rotation_rsbsa_no", "VARCHAR(200)"),
    col("remarks", "LONGTEXT"),
    col("attachment", "VARCHAR(200)"),
    col("active", "ENUM('1','0')"),
    col("date_created", "TIMESTAMP NULL"),
    col("slip_b_update", "TINYINT(4)"),
    col("from_slip_b_update", "TINYINT(4)"),
];

const FARMPARCELOWNERSHIP: &[Column] = &[
    col("farmownID", "INT(11)"),
    col("parcel_id", "VARCHAR(50)"),
    col("rsbsa_no", "VARCHAR(50)"),
    col("own_status", "VARCHAR(100)"),
    col("date_created", "TIMESTAMP NULL"),
    col("active", "ENUM('1','0')"),
    col("encoder_agency", "VARCHAR(50)"),
    col("encoder_id", "VARCHAR(50)"),
    col("encoder_fullname", "VARCHAR(255)"),
];

/// Table keyed by `rsbsa_no` with an AUTO_INCREMENT id
fn keyed(
    name: &'static str,
    columns: &'static [Column],
    cardinality: Cardinality,
    uppercase_fields: &'static [&'static str],
) -> TableSpec {
    TableSpec {
        name: Cow::Borrowed(name),
        columns,
        primary_key: Some(columns[0].name),
        surrogate_key: true,
        indexes: RSBSA_INDEX,
        cardinality,
        key_column: "rsbsa_no",
        uppercase_fields,
        resolution: Resolution::Direct,
        cascade: None,
    }
}

pub(super) fn all() -> Vec<TableSpec> {
    use Cardinality::*;

    vec![
        keyed(
            "farmers_kyc1",
            FARMERS_KYC1,
            OneToOne,
            &[
                "data_source",
                "first_name",
                "middle_name",
                "surname",
                "ext_name",
                "mother_maiden_name",
                "maiden_fname",
                "maiden_mname",
                "maiden_lname",
                "maiden_extname",
                "birth_prv",
                "birth_prv_mun",
                "street",
            ],
        ),
        keyed(
            "farmers_kyc2",
            FARMERS_KYC2,
            OneToOne,
            &[
                "mob_number_fname",
                "mob_number_mname",
                "mob_number_lname",
                "mob_number_extname",
                "spouse",
                "hh_head_name",
                "hh_relationship",
                "emergency_name",
            ],
        ),
        keyed(
            "farmers_kyc3",
            FARMERS_KYC3,
            OneToOne,
            &["vtc_bgy_chair", "vtc_agri_office", "vtc_mafc_chair"],
        ),
        keyed(
            "farmers_kyc4",
            FARMERS_KYC4,
            OneToOne,
            &["encoder_fullname", "encoder_fullname_updated", "deceased_reason"],
        ),
        keyed("farmers_attachments", FARMERS_ATTACHMENTS, OneToMany, ENCODER_FIELDS),
        keyed("farmers_fca", FARMERS_FCA, OneToMany, ENCODER_FIELDS),
        keyed("farmers_form_attachments", FARMERS_FORM_ATTACHMENTS, OneToMany, ENCODER_FIELDS),
        keyed(
            "farmers_livelihood",
            FARMERS_LIVELIHOOD,
            OneToMany,
            &["livelihood", "activity_work", "specify"],
        ),
        TableSpec {
            indexes: RSBSA_AND_PARCEL_INDEX,
            ..keyed("farmparcelactivity", FARMPARCELACTIVITY, OneToMany, PARCEL_FIELDS)
        },
        TableSpec {
            indexes: RSBSA_AND_PARCEL_INDEX,
            ..keyed("farmparcelattachments", FARMPARCELATTACHMENTS, OneToMany, PARCEL_FIELDS)
        },
        TableSpec {
            name: Cow::Borrowed("farmparcel"),
            columns: FARMPARCEL,
            primary_key: Some("parcel_id"),
            surrogate_key: false,
            indexes: &["owner_rsbsa_no"],
            cardinality: OneToMany,
            key_column: "parcel_id",
            uppercase_fields: PARCEL_FIELDS,
            resolution: Resolution::ViaJunction {
                junction: "farmparcelownership",
                link_column: "parcel_id",
            },
            cascade: None,
        },
        TableSpec {
            indexes: RSBSA_AND_PARCEL_INDEX,
            cascade: Some(Cascade {
                table: "farmparcel",
                link_column: "parcel_id",
            }),
            ..keyed(
                "farmparcelownership",
                FARMPARCELOWNERSHIP,
                OneToMany,
                &["encoder_agency", "encoder_fullname"],
            )
        },
    ]
}
