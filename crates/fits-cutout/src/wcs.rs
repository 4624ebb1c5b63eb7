//! Thin adapter over the `wcs` crate.
//!
//! Builds projection state from parsed header cards and exposes pixel↔sky
//! conversions in FITS pixel coordinates and degree-valued `[ra, dec]`.

use wcs::{ImgXY, LonLat, WCSParams, WCS};

use crate::cutbox::{DEG_PER_RAD, RAD_PER_DEG};
use crate::error::{Error, Result};
use crate::header::Header;

/// World-coordinate state for one image header.
#[derive(Debug)]
pub struct Wcs {
    inner: WCS,
}

impl Wcs {
    /// Build WCS state from an image header.
    ///
    /// When every axis type ends in `-SIP`, any `PVi_ma` distortion terms are
    /// discarded before the projection is set up: SCAMP/SWARP-style PV terms
    /// conflict with the SIP convention, and SIP wins.
    pub fn from_header(header: &Header) -> Result<Wcs> {
        let params = build_params(header)?;
        let inner = WCS::new(&params)
            .map_err(|e| Error::internal(format!("Failed to extract WCS from FITS header: {e}")))?;
        Ok(Wcs { inner })
    }

    /// Map FITS pixel coordinates to `[ra, dec]` in degrees.
    pub fn pixel_to_sky(&self, pix: [f64; 2]) -> Result<[f64; 2]> {
        let lonlat = self
            .inner
            .unproj(&ImgXY::new(pix[0], pix[1]))
            .ok_or_else(|| Error::bad_request("Invalid pixel coordinates"))?;
        Ok([lonlat.lon() * DEG_PER_RAD, lonlat.lat() * DEG_PER_RAD])
    }

    /// Map `[ra, dec]` in degrees to FITS pixel coordinates.
    pub fn sky_to_pixel(&self, sky: [f64; 2]) -> Result<[f64; 2]> {
        let lonlat = LonLat::new(sky[0] * RAD_PER_DEG, sky[1] * RAD_PER_DEG);
        let xy = self
            .inner
            .proj(&lonlat)
            .ok_or_else(|| Error::bad_request("Invalid sky coordinates"))?;
        Ok([xy.x(), xy.y()])
    }
}

/// Collect every keyword the projection library understands.
fn build_params(header: &Header) -> Result<WCSParams> {
    let ctype1 = header
        .string("CTYPE1")
        .ok_or_else(|| Error::internal("FITS file contains no valid WCSes"))?
        .to_string();
    let naxis = header.integer("NAXIS");
    let naxis1 = header
        .integer("NAXIS1")
        .ok_or_else(|| Error::internal("Failed to extract WCS from FITS header"))?;
    let naxis2 = header
        .integer("NAXIS2")
        .ok_or_else(|| Error::internal("Failed to extract WCS from FITS header"))?;

    let sip_everywhere = ctype1.ends_with("-SIP")
        && header
            .string("CTYPE2")
            .is_some_and(|c| c.ends_with("-SIP"));

    let f = |k: &str| header.float(k);
    let i = |k: &str| header.integer(k);
    let s = |k: &str| header.string(k).map(String::from);
    // Distortion terms are gated on the SIP check above.
    let pv = |k: &str| if sip_everywhere { None } else { header.float(k) };

    Ok(WCSParams {
        ctype1,
        naxis,
        naxis1,
        naxis2,
        naxis3: i("NAXIS3"),
        naxis4: i("NAXIS4"),
        ctype2: s("CTYPE2"),
        ctype3: s("CTYPE3"),
        a_order: i("A_ORDER"),
        b_order: i("B_ORDER"),
        ap_order: i("AP_ORDER"),
        bp_order: i("BP_ORDER"),
        crpix1: f("CRPIX1"),
        crpix2: f("CRPIX2"),
        crpix3: f("CRPIX3"),
        crval1: f("CRVAL1"),
        crval2: f("CRVAL2"),
        crval3: f("CRVAL3"),
        crota1: f("CROTA1"),
        crota2: f("CROTA2"),
        crota3: f("CROTA3"),
        cdelt1: f("CDELT1"),
        cdelt2: f("CDELT2"),
        cdelt3: f("CDELT3"),
        lonpole: f("LONPOLE"),
        latpole: f("LATPOLE"),
        equinox: f("EQUINOX"),
        epoch: f("EPOCH"),
        radesys: s("RADESYS"),
        pv1_0: pv("PV1_0"),
        pv1_1: pv("PV1_1"),
        pv1_2: pv("PV1_2"),
        pv2_0: pv("PV2_0"),
        pv2_1: pv("PV2_1"),
        pv2_2: pv("PV2_2"),
        pv2_3: pv("PV2_3"),
        pv2_4: pv("PV2_4"),
        pv2_5: pv("PV2_5"),
        pv2_6: pv("PV2_6"),
        pv2_7: pv("PV2_7"),
        pv2_8: pv("PV2_8"),
        pv2_9: pv("PV2_9"),
        pv2_10: pv("PV2_10"),
        pv2_11: pv("PV2_11"),
        pv2_12: pv("PV2_12"),
        pv2_13: pv("PV2_13"),
        pv2_14: pv("PV2_14"),
        pv2_15: pv("PV2_15"),
        pv2_16: pv("PV2_16"),
        pv2_17: pv("PV2_17"),
        pv2_18: pv("PV2_18"),
        pv2_19: pv("PV2_19"),
        pv2_20: pv("PV2_20"),
        cd1_1: f("CD1_1"),
        cd1_2: f("CD1_2"),
        cd1_3: f("CD1_3"),
        cd2_1: f("CD2_1"),
        cd2_2: f("CD2_2"),
        cd2_3: f("CD2_3"),
        cd3_1: f("CD3_1"),
        cd3_2: f("CD3_2"),
        cd3_3: f("CD3_3"),
        pc1_1: f("PC1_1"),
        pc1_2: f("PC1_2"),
        pc1_3: f("PC1_3"),
        pc2_1: f("PC2_1"),
        pc2_2: f("PC2_2"),
        pc2_3: f("PC2_3"),
        pc3_1: f("PC3_1"),
        pc3_2: f("PC3_2"),
        pc3_3: f("PC3_3"),
        a_0_0: f("A_0_0"),
        a_1_0: f("A_1_0"),
        a_2_0: f("A_2_0"),
        a_3_0: f("A_3_0"),
        a_4_0: f("A_4_0"),
        a_5_0: f("A_5_0"),
        a_6_0: f("A_6_0"),
        a_0_1: f("A_0_1"),
        a_1_1: f("A_1_1"),
        a_2_1: f("A_2_1"),
        a_3_1: f("A_3_1"),
        a_4_1: f("A_4_1"),
        a_5_1: f("A_5_1"),
        a_0_2: f("A_0_2"),
        a_1_2: f("A_1_2"),
        a_2_2: f("A_2_2"),
        a_3_2: f("A_3_2"),
        a_4_2: f("A_4_2"),
        a_0_3: f("A_0_3"),
        a_1_3: f("A_1_3"),
        a_2_3: f("A_2_3"),
        a_3_3: f("A_3_3"),
        a_0_4: f("A_0_4"),
        a_1_4: f("A_1_4"),
        a_2_4: f("A_2_4"),
        a_0_5: f("A_0_5"),
        a_1_5: f("A_1_5"),
        a_0_6: f("A_0_6"),
        ap_0_0: f("AP_0_0"),
        ap_1_0: f("AP_1_0"),
        ap_2_0: f("AP_2_0"),
        ap_3_0: f("AP_3_0"),
        ap_4_0: f("AP_4_0"),
        ap_5_0: f("AP_5_0"),
        ap_6_0: f("AP_6_0"),
        ap_0_1: f("AP_0_1"),
        ap_1_1: f("AP_1_1"),
        ap_2_1: f("AP_2_1"),
        ap_3_1: f("AP_3_1"),
        ap_4_1: f("AP_4_1"),
        ap_5_1: f("AP_5_1"),
        ap_0_2: f("AP_0_2"),
        ap_1_2: f("AP_1_2"),
        ap_2_2: f("AP_2_2"),
        ap_3_2: f("AP_3_2"),
        ap_4_2: f("AP_4_2"),
        ap_0_3: f("AP_0_3"),
        ap_1_3: f("AP_1_3"),
        ap_2_3: f("AP_2_3"),
        ap_3_3: f("AP_3_3"),
        ap_0_4: f("AP_0_4"),
        ap_1_4: f("AP_1_4"),
        ap_2_4: f("AP_2_4"),
        ap_0_5: f("AP_0_5"),
        ap_1_5: f("AP_1_5"),
        ap_0_6: f("AP_0_6"),
        b_0_0: f("B_0_0"),
        b_1_0: f("B_1_0"),
        b_2_0: f("B_2_0"),
        b_3_0: f("B_3_0"),
        b_4_0: f("B_4_0"),
        b_5_0: f("B_5_0"),
        b_6_0: f("B_6_0"),
        b_0_1: f("B_0_1"),
        b_1_1: f("B_1_1"),
        b_2_1: f("B_2_1"),
        b_3_1: f("B_3_1"),
        b_4_1: f("B_4_1"),
        b_5_1: f("B_5_1"),
        b_0_2: f("B_0_2"),
        b_1_2: f("B_1_2"),
        b_2_2: f("B_2_2"),
        b_3_2: f("B_3_2"),
        b_4_2: f("B_4_2"),
        b_0_3: f("B_0_3"),
        b_1_3: f("B_1_3"),
        b_2_3: f("B_2_3"),
        b_3_3: f("B_3_3"),
        b_0_4: f("B_0_4"),
        b_1_4: f("B_1_4"),
        b_2_4: f("B_2_4"),
        b_0_5: f("B_0_5"),
        b_1_5: f("B_1_5"),
        b_0_6: f("B_0_6"),
        bp_0_0: f("BP_0_0"),
        bp_1_0: f("BP_1_0"),
        bp_2_0: f("BP_2_0"),
        bp_3_0: f("BP_3_0"),
        bp_4_0: f("BP_4_0"),
        bp_5_0: f("BP_5_0"),
        bp_6_0: f("BP_6_0"),
        bp_0_1: f("BP_0_1"),
        bp_1_1: f("BP_1_1"),
        bp_2_1: f("BP_2_1"),
        bp_3_1: f("BP_3_1"),
        bp_4_1: f("BP_4_1"),
        bp_5_1: f("BP_5_1"),
        bp_0_2: f("BP_0_2"),
        bp_1_2: f("BP_1_2"),
        bp_2_2: f("BP_2_2"),
        bp_3_2: f("BP_3_2"),
        bp_4_2: f("BP_4_2"),
        bp_0_3: f("BP_0_3"),
        bp_1_3: f("BP_1_3"),
        bp_2_3: f("BP_2_3"),
        bp_3_3: f("BP_3_3"),
        bp_0_4: f("BP_0_4"),
        bp_1_4: f("BP_1_4"),
        bp_2_4: f("BP_2_4"),
        bp_0_5: f("BP_0_5"),
        bp_1_5: f("BP_1_5"),
        bp_0_6: f("BP_0_6"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use crate::error::ErrorClass;
    use crate::testutil::tan_header;

    #[test]
    fn build_from_tan_header() {
        let h = tan_header(100, 100, 10.0, 20.0, 1.0 / 60.0);
        assert!(Wcs::from_header(&h).is_ok());
    }

    #[test]
    fn missing_ctype_is_internal() {
        let h = Header {
            cards: vec![Card::integer(b"NAXIS", 2, None)],
        };
        let e = Wcs::from_header(&h).unwrap_err();
        assert_eq!(e.class, ErrorClass::Internal);
    }

    #[test]
    fn round_trip_within_tolerance() {
        let h = tan_header(100, 100, 10.0, 20.0, 1.0 / 60.0);
        let wcs = Wcs::from_header(&h).unwrap();
        let sky = wcs.pixel_to_sky([30.0, 70.0]).unwrap();
        let pix = wcs.sky_to_pixel(sky).unwrap();
        assert!((pix[0] - 30.0).abs() < 1e-6, "{pix:?}");
        assert!((pix[1] - 70.0).abs() < 1e-6, "{pix:?}");
    }

    #[test]
    fn center_maps_near_crval() {
        let h = tan_header(100, 100, 10.0, 20.0, 1.0 / 60.0);
        let wcs = Wcs::from_header(&h).unwrap();
        let pix = wcs.sky_to_pixel([10.0, 20.0]).unwrap();
        let sky = wcs.pixel_to_sky(pix).unwrap();
        assert!((sky[0] - 10.0).abs() < 1e-9);
        assert!((sky[1] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn sip_header_drops_pv_terms() {
        let mut h = tan_header(100, 100, 10.0, 20.0, 1.0 / 60.0);
        for card in &mut h.cards {
            if card.keyword_str() == "CTYPE1" {
                *card = Card::string(b"CTYPE1", "RA---TAN-SIP", None);
            } else if card.keyword_str() == "CTYPE2" {
                *card = Card::string(b"CTYPE2", "DEC--TAN-SIP", None);
            }
        }
        h.cards.push(Card::float(b"PV1_1", 42.0, None));
        let params = build_params(&h).unwrap();
        assert_eq!(params.pv1_1, None);

        // Without SIP axis types the PV terms survive.
        let h2 = {
            let mut h2 = tan_header(100, 100, 10.0, 20.0, 1.0 / 60.0);
            h2.cards.push(Card::float(b"PV1_1", 42.0, None));
            h2
        };
        let params2 = build_params(&h2).unwrap();
        assert_eq!(params2.pv1_1, Some(42.0));
    }
}
